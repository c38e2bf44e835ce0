//! Integration tests for fault-tolerant bulk copy, through both the Rust
//! API and the C ABI.

#![cfg(unix)]
#![expect(
    clippy::undocumented_unsafe_blocks,
    reason = "fault-injection test harness — copies deliberately read a no-access page"
)]

mod common;

use common::NoAccessPage;
use sigguard::cabi::{sigguard_copy, SIGGUARD_ERROR};
use sigguard::{copy, in_guarded_region, run, CopyOp, Error};

const UNTOUCHED: u8 = 0xAA;

#[test]
fn fault_mid_sequence_keeps_earlier_and_skips_later() {
    let page = NoAccessPage::new();
    let first = *b"first triple";
    let third = *b"third triple";
    let mut dst1 = [0u8; 12];
    let mut dst2 = [0u8; 16];
    let mut dst3 = [UNTOUCHED; 12];

    let ops = [
        CopyOp::new(&first, &mut dst1),
        CopyOp {
            src: page.as_ptr(),
            dst: dst2.as_mut_ptr(),
            len: dst2.len(),
        },
        CopyOp::new(&third, &mut dst3),
    ];

    let err = unsafe { copy(&ops) }.unwrap_err();
    assert_eq!(err, common::no_access_kind());
    assert_eq!(err.as_fault().unwrap().address(), Some(page.addr()));
    assert_eq!(&dst1, b"first triple");
    assert!(dst3.iter().all(|&b| b == UNTOUCHED));
    assert!(!in_guarded_region());
}

#[test]
fn successful_copy_after_fault() {
    let page = NoAccessPage::new();
    let mut sink = [0u8; 8];
    let bad = CopyOp {
        src: page.as_ptr(),
        dst: sink.as_mut_ptr(),
        len: sink.len(),
    };
    assert!(unsafe { copy(&[bad]) }.is_err());

    let src = *b"recover!";
    let mut dst = [0u8; 8];
    unsafe { copy(&[CopyOp::new(&src, &mut dst)]) }.unwrap();
    assert_eq!(&dst, b"recover!");
}

#[test]
fn copy_inside_guarded_region_is_rejected() {
    let src = *b"abc";
    let mut dst = [0u8; 3];
    let inner = run(|| unsafe { copy(&[CopyOp::new(&src, &mut dst)]) }).unwrap();
    assert!(matches!(inner, Err(Error::NestedRegion)));
    assert_eq!(dst, [0u8; 3]);
}

// ── C ABI ─────────────────────────────────────────────────────────────

#[test]
fn c_copy_returns_signal_number_on_fault() {
    let page = NoAccessPage::new();
    let src = *b"ok";
    let mut dst_ok = [0u8; 2];
    let mut dst_bad = [0u8; 4];
    let ops = [
        CopyOp::new(&src, &mut dst_ok),
        CopyOp {
            src: page.as_ptr(),
            dst: dst_bad.as_mut_ptr(),
            len: dst_bad.len(),
        },
    ];

    let rc = unsafe { sigguard_copy(ops.as_ptr(), ops.len()) };
    assert_eq!(Some(rc), common::no_access_kind().signal());
    assert_eq!(&dst_ok, b"ok");
}

#[test]
fn c_copy_nested_returns_error_code() {
    let src = *b"x";
    let mut dst = [0u8; 1];
    let op = CopyOp::new(&src, &mut dst);
    let rc = run(|| unsafe { sigguard_copy(&op, 1) }).unwrap();
    assert_eq!(rc, SIGGUARD_ERROR);
}

#[test]
fn c_copy_null_source_reports_segmentation() {
    let mut dst = [UNTOUCHED; 4];
    let op = CopyOp {
        src: std::ptr::null(),
        dst: dst.as_mut_ptr(),
        len: dst.len(),
    };
    let rc = unsafe { sigguard_copy(&op, 1) };
    assert_eq!(rc, libc::SIGSEGV);
}
