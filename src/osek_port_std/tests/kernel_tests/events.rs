//! Waiting for events
use osek_core::{EventMask, SetEventError, StatusType, TaskId, TaskState, WaitEventError};
use osek_kernel::cfg::{CfgBuilder, TaskDefiner};
use osek_port_std::{run_interrupt, take_dispatch_log, Dispatch, InterruptCategory};

use crate::{assert_entry_invariant, take_error_log};

const WAITER: TaskId = TaskId::new(0);
const WORKER: TaskId = TaskId::new(1);
const IDLE_LOOP: TaskId = TaskId::new(2);

const EV_DATA: EventMask = EventMask::from_bits_retain(1 << 0);
const EV_STOP: EventMask = EventMask::from_bits_retain(1 << 5);
const EV_LOG: EventMask = EventMask::from_bits_retain(1 << 9);

crate::define_system!(CfgBuilder::new()
    .num_priority_levels(8)
    .task(TaskDefiner::new().priority(1).extended(true))
    .task(TaskDefiner::new().priority(3))
    .task(TaskDefiner::new().priority(7).autostart(true)));

fn switch(from: Option<TaskId>, to: Option<TaskId>) -> Dispatch {
    Dispatch { from, to }
}

#[test]
fn waiting_task_releases_processor() {
    let kernel = new_kernel();
    kernel.start_os();
    kernel.activate_task(WAITER).unwrap();
    take_dispatch_log(&kernel);

    kernel.wait_event(EV_DATA | EV_STOP).unwrap();
    assert_eq!(kernel.task_state(WAITER), Ok(TaskState::Waiting));
    assert_eq!(kernel.running_task(), Some(IDLE_LOOP));
    assert_eq!(
        take_dispatch_log(&kernel),
        [switch(Some(WAITER), Some(IDLE_LOOP))]
    );
    assert_entry_invariant(&kernel);

    // A waiting extended task still holds its only activation. The rejected
    // activation leaves an unrelated pending event alone.
    kernel.set_event(WAITER, EV_LOG).unwrap();
    assert_eq!(kernel.task_state(WAITER), Ok(TaskState::Waiting));
    assert_eq!(
        kernel.activate_task(WAITER).map_err(StatusType::from),
        Err(StatusType::ActivationLimitExceeded)
    );
    assert_eq!(kernel.event(WAITER), Ok(EV_LOG));
    take_error_log();

    kernel.set_event(WAITER, EV_STOP).unwrap();
    assert_eq!(kernel.running_task(), Some(WAITER));
    assert_eq!(kernel.task_state(IDLE_LOOP), Ok(TaskState::Ready));
    assert_eq!(
        take_dispatch_log(&kernel),
        [switch(Some(IDLE_LOOP), Some(WAITER))]
    );
    assert_eq!(kernel.event(WAITER), Ok(EV_LOG | EV_STOP));
    assert_entry_invariant(&kernel);
}

#[test]
fn less_urgent_setter_is_preempted() {
    let kernel = new_kernel();
    kernel.start_os();
    kernel.activate_task(WAITER).unwrap();
    kernel.activate_task(WORKER).unwrap();
    kernel.wait_event(EV_DATA).unwrap();
    assert_eq!(kernel.running_task(), Some(WORKER));

    kernel.set_event(WAITER, EV_DATA).unwrap();
    assert_eq!(kernel.running_task(), Some(WAITER));
    assert_eq!(kernel.task_state(WORKER), Ok(TaskState::Ready));
}

#[test]
fn event_from_interrupt_wakes_task_at_exit() {
    let kernel = new_kernel();
    kernel.start_os();
    kernel.activate_task(WAITER).unwrap();
    kernel.wait_event(EV_DATA).unwrap();
    take_dispatch_log(&kernel);

    run_interrupt(&kernel, InterruptCategory::Category2, |kernel| {
        kernel.set_event(WAITER, EV_DATA).unwrap();
        assert_eq!(kernel.task_state(WAITER), Ok(TaskState::Ready));
        assert_eq!(kernel.running_task(), Some(IDLE_LOOP));
    });

    assert_eq!(kernel.running_task(), Some(WAITER));
    assert_eq!(
        take_dispatch_log(&kernel),
        [switch(Some(IDLE_LOOP), Some(WAITER))]
    );
}

#[test]
fn basic_tasks_cannot_use_events() {
    let kernel = new_kernel();
    kernel.start_os();

    assert_eq!(
        kernel.set_event(IDLE_LOOP, EV_DATA),
        Err(SetEventError::Access)
    );
    assert_eq!(kernel.wait_event(EV_DATA), Err(WaitEventError::Access));
    assert_eq!(
        kernel.set_event(WAITER, EV_DATA),
        Err(SetEventError::State)
    );

    let statuses: Vec<_> = take_error_log().iter().map(|info| info.status).collect();
    assert_eq!(
        statuses,
        [StatusType::Access, StatusType::Access, StatusType::State]
    );
}

#[test]
fn wait_from_interrupt_is_rejected() {
    let kernel = new_kernel();
    kernel.start_os();

    run_interrupt(&kernel, InterruptCategory::Category2, |kernel| {
        assert_eq!(kernel.wait_event(EV_DATA), Err(WaitEventError::CallLevel));
    });
    assert_eq!(kernel.running_task(), Some(IDLE_LOOP));
}
