use std::fs;

use tempfile::NamedTempFile;
use zs2codec::stream::FILE_MARKER_BYTES;
use zs2codec::{container, dump, markup, pipeline, tree, DecodeOptions, Value, Zs2Error};

fn stream(body: &[u8]) -> Vec<u8> {
    let mut out = FILE_MARKER_BYTES.to_vec();
    out.extend_from_slice(body);
    out
}

/// `QS_ValSetting` record as written by the instrument software, without the
/// array header.
const VAL_SETTING: &[u8] = b"\x02\x00\x00\x00\x80\x00\x00\x00\x80\x02\x00\x00\x00\x09\x00\x00\x80U\x00T\x00_\x00N\x00o\x00\
U\x00n\x00i\x00t\x00\x01\x01\x00\x00\x00\x00\x00\x00\x00\x00\x00\x0c\x00\x00\x00\x05\x00\x00\x80%\x00/\x00m\x00i\x00n\x00\
\x03\x00\x00\x80%\x00/\x00s\x00\x07\x00\x00\x80%\x00L\x000\x00/\x00m\x00i\x00n\x00\x05\x00\x00\x80%\x00L\x000\x00/\x00s\x00\
\x05\x00\x00\x801\x00/\x00m\x00i\x00n\x00\x03\x00\x00\x801\x00/\x00s\x00\x08\x00\x00\x80k\x00p\x00s\x00i\x00/\x00m\x00i\x00n\x00\
\x06\x00\x00\x80k\x00p\x00s\x00i\x00/\x00s\x00\x05\x00\x00\x80M\x00P\x00a\x00/\x00s\x00\x06\x00\x00\x80N\x00/\x00m\x00m\x00\xb2\x00s\x00\
\x07\x00\x00\x80p\x00s\x00i\x00/\x00m\x00i\x00n\x00\x05\x00\x00\x80p\x00s\x00i\x00/\x00s\x00\xfc\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00";

fn val_setting_chunk() -> Vec<u8> {
    let mut chunk = b"\x0dQS_ValSetting\xee\x11\x00".to_vec();
    chunk.extend_from_slice(&(VAL_SETTING.len() as u32).to_le_bytes());
    chunk.extend_from_slice(VAL_SETTING);
    chunk
}

fn composite() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(b"\x04Root\xdd\x00");
    body.extend_from_slice(b"\x05Value\x11\x03\x00\x00\x00");
    body.extend_from_slice(b"\x04Unit");
    body.extend_from_slice(b"\x04Name\xaa\x0a\x00\x00\x80x\x00c\x00t\x000\x005\x004\x00.\x00z\x00p\x002\x00");
    body.extend_from_slice(b"\x05Inner\xdd\x03abc");
    body.extend_from_slice(b"\x05Empty\xdd\x00\xff");
    body.extend_from_slice(b"\x04Flag\x99\x01");
    body.extend_from_slice(b"\x03Arr\xee\x04\x00\x02\x00\x00\x00\xd8\xff\x40\xc3\xd8\xff\x40\xc3");
    body.extend_from_slice(b"\x03Dbl\xee\x05\x00\x01\x00\x00\x00\x00\x00\x00\x00\x00\x00\xf8\x3f");
    body.extend_from_slice(b"\x04None\xee\x00\x00\x00\x00\x00\x00");
    body.extend_from_slice(b"\x05Entry\xee\x11\x00\x03\x00\x00\x00\x01\x02\x03");
    body.extend_from_slice(&val_setting_chunk());
    body.extend_from_slice(b"\xff\xff");
    stream(&body)
}

fn find<'a>(chunks: &'a [zs2codec::DecodedChunk], name: &str) -> &'a zs2codec::DecodedChunk {
    chunks.iter().find(|c| c.name == name).unwrap()
}

#[test]
fn test_scalar_chunks() {
    let data = stream(b"\x04Root\xdd\x00\x05Value\x11\x03\x00\x00\x00\x05Float\xbb\x66\x66\x46\x40\x04Prec\xbb\x01\x00\x80\x3f\xff");
    let chunks = pipeline::decode_stream(&data, DecodeOptions::default()).unwrap();

    assert_eq!(chunks.len(), 5);
    assert_eq!(find(&chunks, "Value").type_code, "11");
    assert_eq!(find(&chunks, "Value").value, Value::I32(3));
    assert_eq!(find(&chunks, "Float").value, Value::Float(3.1));
    assert_eq!(find(&chunks, "Prec").value, Value::Float(1.0000001));
    assert!(chunks[4].is_end());

    assert_eq!(pipeline::encode_stream(&chunks).unwrap(), data);
}

#[test]
fn test_single_precision_array() {
    let data = stream(b"\x03Arr\xee\x04\x00\x02\x00\x00\x00\xd8\xff\x40\xc3\xd8\xff\x40\xc3");
    let chunks = pipeline::decode_stream(&data, DecodeOptions::default()).unwrap();
    assert_eq!(chunks[0].type_code, "EE04");
    assert_eq!(chunks[0].value, Value::List(vec![Value::Float(-192.99939), Value::Float(-192.99939)]));
    assert_eq!(pipeline::encode_stream(&chunks).unwrap(), data);
}

#[test]
fn test_empty_section_roundtrip() {
    let data = stream(b"\x04Root\xdd\x00\xff");
    let json = pipeline::stream_to_json(&data, false).unwrap();
    let nodes = tree::from_json(&json).unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].name, "Root");
    assert!(nodes[0].children.is_empty());
    assert_eq!(pipeline::json_to_stream(&json).unwrap(), data);
}

#[test]
fn test_parameter_record() {
    let data = stream(&val_setting_chunk());
    let chunks = pipeline::decode_stream(&data, DecodeOptions::default()).unwrap();
    let record = &chunks[0];

    assert_eq!(record.type_code, "EE11-B2SLS3BH2B(H)(S)11B");
    let values = record.value.as_slice().unwrap();
    assert_eq!(values.len(), 24);
    assert_eq!(values[0].as_i128(), Some(2));
    assert_eq!(values[1], Value::Utf16(String::new()));
    assert_eq!(values[4], Value::Utf16("UT_NoUnit".into()));
    assert_eq!(values[11], Value::empty_list());

    let units: Vec<&str> = values[12].as_slice().unwrap().iter().filter_map(Value::as_str).collect();
    assert_eq!(
        units,
        [
            "%/min", "%/s", "%L0/min", "%L0/s", "1/min", "1/s", "kpsi/min", "kpsi/s", "MPa/s",
            "N/mm\u{b2}s", "psi/min", "psi/s",
        ]
    );
    assert_eq!(values[13].as_i128(), Some(252));
    assert!(values[14..].iter().all(|v| v.as_i128() == Some(0)));

    assert_eq!(pipeline::encode_stream(&chunks).unwrap(), data);
}

#[test]
fn test_composite_roundtrip() {
    let data = composite();
    let chunks = pipeline::decode_stream(&data, DecodeOptions::default()).unwrap();

    assert_eq!(find(&chunks, "Unit").type_code, "");
    assert_eq!(find(&chunks, "Name").value, Value::Utf16("xct054.zp2".into()));
    assert_eq!(find(&chunks, "Inner").value, Value::Ascii("abc".into()));
    assert_eq!(find(&chunks, "Dbl").value, Value::List(vec![Value::Float(1.5)]));
    assert_eq!(find(&chunks, "None").type_code, "EE00");
    assert!(find(&chunks, "Entry").type_code.starts_with("EE11"));

    assert_eq!(pipeline::encode_stream(&chunks).unwrap(), data);
    assert_eq!(pipeline::json_to_stream(&pipeline::stream_to_json(&data, true).unwrap()).unwrap(), data);
}

#[test]
fn test_composite_xml_roundtrip() {
    let data = composite();
    let xml = pipeline::stream_to_xml(&data, false).unwrap();
    assert!(xml.contains("<QS_ValSetting type='EE11-B2SLS3BH2B(H)(S)11B'"));
    assert!(xml.contains("<Empty type='DD' value=\"\" >"));
    assert_eq!(pipeline::xml_to_stream(&xml).unwrap(), data);
    assert_eq!(pipeline::xml_to_stream(&pipeline::stream_to_xml(&data, true).unwrap()).unwrap(), data);
}

#[test]
fn test_empty_section_as_empty_element() {
    let xml = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Root type='DD' value=\"\" >\n  <Empty type='DD' value=\"\" />\n  <Value type='11' value=\"3\" />\n</Root>\n";
    let expected = stream(b"\x04Root\xdd\x00\x05Empty\xdd\x00\xff\x05Value\x11\x03\x00\x00\x00\xff");
    assert_eq!(pipeline::xml_to_stream(xml).unwrap(), expected);
}

#[test]
fn test_odd_bool_and_signalling_nan_are_exact() {
    let data = stream(
        b"\x04Root\xdd\x00\x04Flag\x99\x02\x01F\xbb\x01\x00\x80\x7f\x03Arr\xee\x04\x00\x02\x00\x00\x00\x01\x00\x80\xff\x00\x00\xc0\x7f\xff",
    );
    let chunks = pipeline::decode_stream(&data, DecodeOptions::default()).unwrap();
    assert_eq!(find(&chunks, "Flag").value, Value::U8(2));
    assert!(find(&chunks, "F").value.as_f64().unwrap().is_nan());

    assert_eq!(pipeline::encode_stream(&chunks).unwrap(), data);
    assert_eq!(pipeline::json_to_stream(&pipeline::stream_to_json(&data, false).unwrap()).unwrap(), data);
    assert_eq!(pipeline::xml_to_stream(&pipeline::stream_to_xml(&data, false).unwrap()).unwrap(), data);
}

#[test]
fn test_undefined_double_survives_json() {
    // QS_ValPar version 1 whose (d) group holds one all-ones double
    let mut body = b"\x01".to_vec();
    body.extend_from_slice(&0.5f64.to_le_bytes());
    body.extend_from_slice(b"\x00\x00\x00\x80\x00\x00\x01\x00\x00\x00");
    body.extend_from_slice(&[0xff; 8]);
    body.extend_from_slice(b"\x00\x00\x00\x00\x07");
    let mut chunk = b"\x09QS_ValPar\xee\x11\x00".to_vec();
    chunk.extend_from_slice(&(body.len() as u32).to_le_bytes());
    chunk.extend_from_slice(&body);
    let data = stream(&chunk);

    let chunks = pipeline::decode_stream(&data, DecodeOptions::default()).unwrap();
    assert_eq!(chunks[0].type_code, "EE11-BdSH(d)(B)B");
    let json = pipeline::stream_to_json(&data, false).unwrap();
    assert!(json.contains("NaN:0xffffffffffffffff"));
    assert_eq!(pipeline::json_to_stream(&json).unwrap(), data);
    assert_eq!(pipeline::xml_to_stream(&pipeline::stream_to_xml(&data, false).unwrap()).unwrap(), data);
}

#[test]
fn test_debug_mode_resynchronizes() {
    // the UTF-16 length lacks its marker bit, which the strict scanner rejects
    let data = stream(b"\x04Root\xdd\x00\x04Bad!\xaa\x01\x00\x00\x00\x05Value\x11\x03\x00\x00\x00");
    assert!(matches!(
        pipeline::decode_stream(&data, DecodeOptions::default()),
        Err(Zs2Error::MalformedLength { .. })
    ));

    let chunks = pipeline::decode_stream(&data, DecodeOptions::debug()).unwrap();
    let names: Vec<&str> = chunks.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Root", "Bad!", "Value"]);
    assert_eq!(chunks[1].type_code, "raw");
    assert_eq!(chunks[1].value, Value::Bytes(b"\xaa\x01\x00\x00\x00".to_vec()));
    assert_eq!(chunks[2].value, Value::I32(3));
}

#[test]
fn test_process_cycle() {
    let report = pipeline::process_cycle(&composite()).unwrap();
    assert!(report.is_identical());
    assert_eq!(report.input_fingerprint.len(), 64);
    assert!(report.json_len > 0);
}

#[test]
fn test_tree_nesting() {
    let chunks = pipeline::decode_stream(&composite(), DecodeOptions::default()).unwrap();
    let nodes = tree::build(&chunks, false).unwrap();

    assert_eq!(nodes.len(), 1);
    let root = &nodes[0];
    let names: Vec<&str> = root.children.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, ["Value", "Unit", "Name", "Inner"]);
    let inner = &root.children[3];
    let names: Vec<&str> = inner.children.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, ["Empty", "Flag", "Arr", "Dbl", "None", "Entry", "QS_ValSetting"]);
}

#[test]
fn test_unbalanced_sections() {
    let data = stream(b"\x04Root\xdd\x00\x05Inner\xdd\x00\xff");
    let chunks = pipeline::decode_stream(&data, DecodeOptions::default()).unwrap();

    assert!(matches!(tree::build(&chunks, false), Err(Zs2Error::SectionImbalance { opened: 2, closed: 1 })));
    assert!(matches!(markup::to_xml(&chunks, false), Err(Zs2Error::SectionImbalance { .. })));
    assert!(pipeline::stream_to_json(&data, false).is_err());

    let text = dump::text_dump(&chunks);
    assert!(text.lines().all(|line| !line.contains("  Inner")));
}

#[test]
fn test_unknown_record_name() {
    let data = stream(b"\x06Custom\xee\x11\x00\x02\x00\x00\x00\x01\x02");
    let err = pipeline::decode_stream(&data, DecodeOptions::default()).unwrap_err();
    assert!(matches!(err, Zs2Error::InChunk { .. }));

    let chunks = pipeline::decode_stream(&data, DecodeOptions::debug()).unwrap();
    assert_eq!(chunks[0].type_code, "EE11");
    assert_eq!(chunks[0].value.to_bytes().unwrap(), vec![1, 2]);
}

#[test]
fn test_bad_marker() {
    let data = b"\x00\x00\x00\x00\x04Root\xdd\x00\xff";
    assert!(matches!(
        pipeline::decode_stream(data, DecodeOptions::default()),
        Err(Zs2Error::BadMagic { .. })
    ));
}

#[test]
fn test_container_file_roundtrip() {
    let data = composite();
    let file = NamedTempFile::new().unwrap();

    container::write_stream(file.path(), &data).unwrap();
    let written = fs::read(file.path()).unwrap();
    assert_eq!(&written[..2], &[0x1f, 0x8b]);
    assert_eq!(written[9], 0x0b);

    assert_eq!(container::read_stream(file.path(), false).unwrap(), data);
}

#[test]
fn test_hex_dump_of_stream() {
    let data = b"\x01\x02\x03\x04Hello World!!!";
    assert_eq!(dump::hex_dump(data, 1, 1, 8), "000001: 02 03 04 48 65 6c 6c 6f    \u{b7}\u{b7}\u{b7}Hello");
}
