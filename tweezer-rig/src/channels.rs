//! Inter-task wake-ups
//!
//! Data lives in the control state store; these signals only tell a task
//! that new work is waiting for it.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

/// Stage commands were queued or z should return home
pub static STAGE_WAKE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// The trap layout changed and a new phase mask is needed
pub static PHASEMASK_REQUEST: Signal<CriticalSectionRawMutex, ()> = Signal::new();
