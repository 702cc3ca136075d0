use dtoi_backend::code_buffer::{CodeBuffer, MIN_BUFFER_SIZE};

#[test]
fn emit_and_read() {
    let mut buf = CodeBuffer::new(4096).unwrap();
    buf.emit_u8(0x90); // NOP
    buf.emit_u32(0xDEADBEEF);
    assert_eq!(buf.offset(), 5);
    assert_eq!(buf.as_slice()[0], 0x90);
    assert_eq!(buf.read_u32(1), 0xDEADBEEF);
}

#[test]
fn emit_u64_little_endian() {
    let mut buf = CodeBuffer::new(4096).unwrap();
    buf.emit_u64(0x0102030405060708);
    assert_eq!(buf.as_slice(), [8, 7, 6, 5, 4, 3, 2, 1]);
}

#[test]
fn patch() {
    let mut buf = CodeBuffer::new(4096).unwrap();
    buf.emit_u32(0);
    buf.patch_u32(0, 0x12345678);
    assert_eq!(buf.read_u32(0), 0x12345678);
}

#[test]
fn permissions() {
    let buf = CodeBuffer::new(4096).unwrap();
    buf.set_executable().unwrap();
    buf.set_writable().unwrap();
}

#[test]
fn rounds_up_to_page_size() {
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
    let buf = CodeBuffer::new(1).unwrap();
    assert_eq!(buf.capacity() % page, 0);
    assert!(buf.capacity() >= page);
}

#[test]
fn min_buffer_size_holds_a_pair() {
    // One page must fit a stub plus its trampoline.
    assert!(MIN_BUFFER_SIZE >= 4096);
}

#[test]
#[should_panic(expected = "code buffer overflow")]
fn overflow_panics() {
    let mut buf = CodeBuffer::new(1).unwrap();
    for _ in 0..=buf.capacity() {
        buf.emit_u8(0x90);
    }
}
