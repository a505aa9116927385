//! The variable tree: arrays with scalar metadata children, lookup by
//! name and rejection of files that are not om files.

use std::io::Cursor;

use omfile::{
    OmCompression, OmDataType, OmError, OmFileReader, OmFileWriter, OmScalarValue, OmVariable,
};

#[test]
fn test_array_with_metadata_children() {
    let mut buffer = Cursor::new(Vec::new());
    let mut writer = OmFileWriter::new(&mut buffer).unwrap();

    let units = writer
        .write_scalar("units", &OmScalarValue::String("degC"), &[])
        .unwrap();
    let missing = writer
        .write_scalar("missing_value", &OmScalarValue::Float(-999.0), &[])
        .unwrap();
    let run = writer
        .write_scalar("run", &OmScalarValue::Int64(2024103000), &[])
        .unwrap();

    let data: Vec<f32> = (0..24 * 10).map(|i| i as f32 * 0.25).collect();
    let root = writer
        .write_array(
            "temperature_2m",
            OmDataType::FloatArray,
            OmCompression::PforDelta2d,
            20.0,
            0.0,
            &[24, 10],
            &[6, 10],
            &data,
            &[units, missing, run],
        )
        .unwrap();
    writer.finalize(root).unwrap();

    let mut reader = OmFileReader::new(buffer).unwrap();
    let variable = reader.variable();
    assert_eq!(variable.name(), "temperature_2m");
    assert_eq!(variable.data_type(), OmDataType::FloatArray);
    assert_eq!(variable.number_of_children(), 3);
    assert_eq!(variable.dimensions(), vec![24, 10]);

    {
        let child = reader.child(0).unwrap().expect("first child");
        assert_eq!(child.variable().name(), "units");
        assert_eq!(
            child.variable().scalar_value().unwrap(),
            OmScalarValue::String("degC")
        );
    }
    {
        let child = reader
            .child_by_name("missing_value")
            .unwrap()
            .expect("by name");
        assert_eq!(
            child.variable().scalar_value().unwrap(),
            OmScalarValue::Float(-999.0)
        );
    }
    {
        let child = reader.child_by_name("run").unwrap().expect("by name");
        assert_eq!(
            child.variable().scalar_value().unwrap(),
            OmScalarValue::Int64(2024103000)
        );
    }
    assert!(reader.child_by_name("nope").unwrap().is_none());
    assert!(reader.child(3).unwrap().is_none());

    // The array still decodes with the children attached.
    let decoded = reader.read_f32(&[0, 0], &[24, 10]).unwrap();
    for (g, w) in decoded.iter().zip(data.iter()) {
        assert!((g - w).abs() <= 0.026);
    }
}

#[test]
fn test_nested_children() {
    let mut buffer = Cursor::new(Vec::new());
    let mut writer = OmFileWriter::new(&mut buffer).unwrap();

    let leaf = writer
        .write_scalar("institution", &OmScalarValue::String("open-meteo"), &[])
        .unwrap();
    let group = writer
        .write_scalar("attributes", &OmScalarValue::None, &[leaf])
        .unwrap();
    let root = writer
        .write_scalar("root", &OmScalarValue::None, &[group])
        .unwrap();
    writer.finalize(root).unwrap();

    let mut reader = OmFileReader::new(buffer).unwrap();
    let mut group_reader = reader.child_by_name("attributes").unwrap().unwrap();
    let leaf_reader = group_reader.child_by_name("institution").unwrap().unwrap();
    assert_eq!(
        leaf_reader.variable().scalar_value().unwrap(),
        OmScalarValue::String("open-meteo")
    );
}

#[test]
fn test_scalar_types_roundtrip() {
    let values = [
        OmScalarValue::Int8(-5),
        OmScalarValue::Uint8(200),
        OmScalarValue::Int16(-12345),
        OmScalarValue::Uint16(54321),
        OmScalarValue::Int32(-7_000_000),
        OmScalarValue::Uint32(4_000_000_000),
        OmScalarValue::Int64(-(1 << 50)),
        OmScalarValue::Uint64(1 << 60),
        OmScalarValue::Float(3.5),
        OmScalarValue::Double(-2.25e100),
    ];
    let mut buffer = Cursor::new(Vec::new());
    let mut writer = OmFileWriter::new(&mut buffer).unwrap();
    let mut children = Vec::new();
    for (i, value) in values.iter().enumerate() {
        children.push(
            writer
                .write_scalar(&format!("value_{}", i), value, &[])
                .unwrap(),
        );
    }
    let root = writer
        .write_scalar("root", &OmScalarValue::None, &children)
        .unwrap();
    writer.finalize(root).unwrap();

    let mut reader = OmFileReader::new(buffer).unwrap();
    for (i, value) in values.iter().enumerate() {
        let child = reader.child(i).unwrap().expect("child");
        assert_eq!(child.variable().scalar_value().unwrap(), *value);
    }
}

#[test]
fn test_not_an_om_file() {
    let garbage = Cursor::new(b"GRIB2 is a different format entirely".to_vec());
    match OmFileReader::new(garbage) {
        Err(OmError::NotAnOmFile) => {}
        other => panic!("expected NotAnOmFile, got {:?}", other.map(|_| ())),
    }

    let empty = Cursor::new(Vec::new());
    assert!(OmFileReader::new(empty).is_err());

    // Valid magic but unsupported version.
    let bad_version = Cursor::new(vec![b'O', b'M', 9, 0, 0, 0]);
    match OmFileReader::new(bad_version) {
        Err(OmError::NotAnOmFile) => {}
        other => panic!("expected NotAnOmFile, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_error_codes_are_stable() {
    assert_eq!(OmError::InvalidCompressionType(9).code(), 1);
    assert_eq!(OmError::InvalidDataType(0).code(), 2);
    assert_eq!(OmError::InvalidLutChunkLength(300).code(), 3);
    assert_eq!(OmError::OutOfBoundRead.code(), 4);
    assert_eq!(OmError::NotAnOmFile.code(), 5);
}

#[test]
fn test_scalar_variable_rejects_array_read() {
    let mut buffer = Cursor::new(Vec::new());
    let mut writer = OmFileWriter::new(&mut buffer).unwrap();
    let root = writer
        .write_scalar("just_a_scalar", &OmScalarValue::Float(1.0), &[])
        .unwrap();
    writer.finalize(root).unwrap();

    let mut reader = OmFileReader::new(buffer).unwrap();
    match reader.variable() {
        OmVariable::Scalar(_) => {}
        other => panic!("expected a scalar, got {:?}", other),
    }
    assert!(reader.read_f32(&[0], &[1]).is_err());
}
