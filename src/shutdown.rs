//! Process-wide interrupt request, raised from a signal handler.
//!
//! The CLI host polls it between instructions and answers with a break, so
//! a running program pauses and memory is still flushed on the way out.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static EXIT_CODE: AtomicI32 = AtomicI32::new(0);

pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

pub fn interrupt() {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Consume a pending interrupt, so one Ctrl-C breaks one run.
pub fn take_interrupt() -> bool {
    INTERRUPTED.swap(false, Ordering::SeqCst)
}

pub fn exit_code() -> i32 {
    EXIT_CODE.load(Ordering::SeqCst)
}

/// Record a non-zero exit status. The first one recorded is kept.
pub fn set_exit_code(code: i32) {
    if code != 0 {
        let _ = EXIT_CODE.compare_exchange(0, code, Ordering::SeqCst, Ordering::SeqCst);
    }
}

#[cfg(unix)]
pub fn install() {
    use std::os::raw::c_int;
    const SIGINT: c_int = 2;
    const SIGTERM: c_int = 15;

    extern "C" fn on_signal(_sig: c_int) {
        // Flag only; nothing else is signal-safe here
        interrupt();
    }

    extern "C" {
        fn signal(sig: c_int, handler: extern "C" fn(c_int)) -> usize;
    }

    unsafe {
        signal(SIGINT, on_signal);
        signal(SIGTERM, on_signal);
    }
}

#[cfg(windows)]
pub fn install() {
    type HandlerRoutine = extern "system" fn(u32) -> i32;
    extern "system" {
        fn SetConsoleCtrlHandler(handler: Option<HandlerRoutine>, add: i32) -> i32;
    }
    extern "system" fn on_ctrl(_ctrl_type: u32) -> i32 {
        interrupt();
        1
    }
    unsafe {
        SetConsoleCtrlHandler(Some(on_ctrl), 1);
    }
}

#[cfg(not(any(unix, windows)))]
pub fn install() {}
