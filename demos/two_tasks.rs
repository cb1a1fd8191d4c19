//! Two Tasks Demo - round-robin switching driven by SysTick
//!
//! Task A and task B count in a loop. Every tick the SysTick handler asks
//! the port to switch to the other one; the switch itself happens in PendSV
//! once SysTick has returned.

#![no_std]
#![no_main]
#![allow(static_mut_refs)]

use core::ptr::NonNull;
use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::{entry, exception};
use picoport::task::{OsTcb, TaskStack};
use picoport::{os_ctx_sw, os_current_task, os_task_create};

const CORE_CLOCK_HZ: u32 = 16_000_000;
const TICK_RATE_HZ: u32 = 1_000;

static A_RUNS: AtomicU32 = AtomicU32::new(0);
static B_RUNS: AtomicU32 = AtomicU32::new(0);

static mut A_STK: [u8; 1024] = [0; 1024];
static mut A_TCB: OsTcb = OsTcb::new();
static mut B_STK: [u8; 1024] = [0; 1024];
static mut B_TCB: OsTcb = OsTcb::new();

static mut TASKS: [Option<NonNull<OsTcb>>; 2] = [None, None];

// ============ Tasks ============

fn task_a(_: *mut ()) -> ! {
    picoport::info!("task A started");
    loop {
        let n = A_RUNS.fetch_add(1, Ordering::Relaxed);
        if n % 100_000 == 0 {
            picoport::info!("[A] {} (B at {})", n, B_RUNS.load(Ordering::Relaxed));
        }
    }
}

fn task_b(_: *mut ()) -> ! {
    picoport::info!("task B started");
    loop {
        B_RUNS.fetch_add(1, Ordering::Relaxed);
    }
}

// ============ Tick ============

#[exception]
fn SysTick() {
    let [Some(a), Some(b)] = (unsafe { TASKS }) else {
        return;
    };
    let next = if os_current_task() == Some(a) { b } else { a };
    os_ctx_sw(next);
}

// ============ Main ============

#[entry]
fn main() -> ! {
    let scheme = picoport::os_init().expect("port init failed");
    picoport::info!("kernel lock ceiling: {}", scheme.lock_ceiling());

    let a = os_task_create(
        unsafe { &mut A_TCB },
        "A",
        task_a,
        core::ptr::null_mut(),
        TaskStack::External(unsafe { &mut A_STK }),
    )
    .expect("task A failed");

    let b = os_task_create(
        unsafe { &mut B_TCB },
        "B",
        task_b,
        core::ptr::null_mut(),
        TaskStack::External(unsafe { &mut B_STK }),
    )
    .expect("task B failed");

    unsafe { TASKS = [Some(a), Some(b)] };

    picoport::systick_init(CORE_CLOCK_HZ / TICK_RATE_HZ);

    match picoport::os_start(a) {
        Ok(()) => unreachable!(),
        Err(_) => loop {
            cortex_m::asm::bkpt();
        },
    }
}
