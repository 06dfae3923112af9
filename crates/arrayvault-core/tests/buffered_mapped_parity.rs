use arrayvault_core::{ArrayBody, ArrayFile, ElementValue, ElementWidth, Entry, IoMode};
use tempfile::TempDir;

fn run_update_scenario(mode: IoMode) -> (ArrayBody, (u64, u64, u64, i32, i32)) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("parity.dat");

    let f = ArrayFile::create(&path, 4, 4, mode).unwrap();
    f.write_i32(2, 0xDEADBEEFu32 as i32).unwrap();

    let mut entry = Entry::new(10);
    entry.push(0, ElementValue::Int32(0x1111));
    entry.push(3, ElementValue::Int32(0x3333));
    f.update(std::slice::from_ref(&entry)).unwrap();
    f.close().unwrap();

    let reopened = ArrayFile::open(&path, mode).unwrap();
    let body = ArrayFile::load_array(&path, ElementWidth::Int32).unwrap();
    (body, reopened.header_snapshot())
}

#[test]
fn buffered_and_mapped_backends_agree_on_update_semantics() {
    let (buffered_body, buffered_header) = run_update_scenario(IoMode::Buffered);
    let (mapped_body, mapped_header) = run_update_scenario(IoMode::Mapped);

    assert_eq!(buffered_body, mapped_body);
    assert_eq!(buffered_header, mapped_header);
    assert_eq!(buffered_body, ArrayBody::Int32(vec![0x1111, 0, 0xDEADBEEFu32 as i32, 0x3333]));
}

#[test]
fn resize_then_reload_is_consistent_across_backends() {
    for mode in [IoMode::Buffered, IoMode::Mapped] {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("resize.dat");
        let f = ArrayFile::create(&path, 4, 8, mode).unwrap();
        f.reset(&ArrayBody::Int64(vec![10, 20, 30, 40])).unwrap();
        f.set_array_length(6, None).unwrap();
        f.write_i64(5, 99).unwrap();
        f.close().unwrap();

        let body = ArrayFile::load_array(&path, ElementWidth::Int64).unwrap();
        assert_eq!(body, ArrayBody::Int64(vec![10, 20, 30, 40, 0, 99]));
    }
}
