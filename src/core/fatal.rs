//! Platform assertion hook
//!
//! Conditions the port cannot recover from (a trampled stack sentinel, a
//! task entry returning, a HardFault) end up in [`port_assert`]. The hook
//! receives what failed and where, and never returns.

use core::cell::Cell;
use core::panic::Location;

use critical_section::Mutex;

/// Description of a failed platform assertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssertInfo {
    /// Short tag of the failed check, e.g. `"TStk"`
    pub text: &'static str,
    pub file: &'static str,
    pub line: u32,
}

/// Handler invoked on a failed platform assertion
pub type AssertHook = fn(&AssertInfo) -> !;

static ASSERT_HOOK: Mutex<Cell<AssertHook>> = Mutex::new(Cell::new(default_hook));

/// Last assertion seen by the default hook, kept for post-mortem debugging
static LAST_ASSERT: Mutex<Cell<Option<AssertInfo>>> = Mutex::new(Cell::new(None));

/// Install `hook` and return the previous one
pub fn set_assert_hook(hook: AssertHook) -> AssertHook {
    critical_section::with(|cs| ASSERT_HOOK.borrow(cs).replace(hook))
}

/// Report a fatal condition at the caller's location
#[track_caller]
#[inline(never)]
pub fn port_assert(text: &'static str) -> ! {
    let loc = Location::caller();
    let info = AssertInfo {
        text,
        file: loc.file(),
        line: loc.line(),
    };
    let hook = critical_section::with(|cs| ASSERT_HOOK.borrow(cs).get());
    hook(&info)
}

/// Assertion recorded by the default hook, if it ever ran
pub fn last_assert() -> Option<AssertInfo> {
    critical_section::with(|cs| LAST_ASSERT.borrow(cs).get())
}

fn default_hook(info: &AssertInfo) -> ! {
    critical_section::with(|cs| LAST_ASSERT.borrow(cs).set(Some(*info)));
    crate::error!(
        "port assertion '{}' failed at {}:{}",
        info.text,
        info.file,
        info.line
    );

    #[cfg(target_arch = "arm")]
    {
        cortex_m::interrupt::disable();
        loop {
            cortex_m::asm::udf();
        }
    }

    #[cfg(not(target_arch = "arm"))]
    panic!("port assertion '{}' failed at {}:{}", info.text, info.file, info.line)
}
