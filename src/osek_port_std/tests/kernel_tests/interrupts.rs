//! Services called by simulated interrupt handlers
use osek_core::{
    ActivateTaskError, CallingContext, ScheduleError, StatusType, TaskId, TaskState,
    TerminateTaskError,
};
use osek_kernel::cfg::{CfgBuilder, TaskDefiner};
use osek_port_std::{run_interrupt, take_dispatch_log, Dispatch, InterruptCategory};

use crate::{assert_entry_invariant, take_error_log};

const LOW: TaskId = TaskId::new(0);
const HIGH: TaskId = TaskId::new(1);
const COOPERATIVE: TaskId = TaskId::new(2);

crate::define_system!(CfgBuilder::new()
    .num_priority_levels(4)
    .task(TaskDefiner::new().priority(3).autostart(true))
    .task(TaskDefiner::new().priority(0).max_activations(4))
    .task(TaskDefiner::new().priority(2).preemptible(false)));

#[test]
fn dispatch_is_deferred_to_handler_exit() {
    let kernel = new_kernel();
    kernel.start_os();
    take_dispatch_log(&kernel);

    run_interrupt(&kernel, InterruptCategory::Category2, |kernel| {
        assert_eq!(
            kernel.calling_context(),
            CallingContext::InterruptCategory2
        );
        kernel.activate_task(HIGH).unwrap();
        assert_eq!(kernel.running_task(), Some(LOW));
        assert_eq!(kernel.task_state(HIGH), Ok(TaskState::Ready));
    });

    assert_eq!(kernel.running_task(), Some(HIGH));
    assert_eq!(
        take_dispatch_log(&kernel),
        [Dispatch {
            from: Some(LOW),
            to: Some(HIGH)
        }]
    );
    assert_entry_invariant(&kernel);
}

#[test]
fn nested_handlers_dispatch_once() {
    let kernel = new_kernel();
    kernel.start_os();
    take_dispatch_log(&kernel);

    run_interrupt(&kernel, InterruptCategory::Category2, |kernel| {
        kernel.activate_task(HIGH).unwrap();
        run_interrupt(kernel, InterruptCategory::Category2, |kernel| {
            kernel.activate_task(HIGH).unwrap();
        });
        // Still inside the outer handler
        assert_eq!(kernel.running_task(), Some(LOW));
        assert!(take_dispatch_log(kernel).is_empty());
    });

    assert_eq!(kernel.running_task(), Some(HIGH));
    assert_eq!(kernel.activation_count(HIGH), Some(2));
    assert_eq!(take_dispatch_log(&kernel).len(), 1);
    assert_entry_invariant(&kernel);
}

#[test]
fn activation_limit_from_interrupt() {
    let kernel = new_kernel();
    kernel.start_os();

    run_interrupt(&kernel, InterruptCategory::Category2, |kernel| {
        for _ in 0..4 {
            kernel.activate_task(HIGH).unwrap();
        }
        assert_eq!(
            kernel.activate_task(HIGH),
            Err(ActivateTaskError::ActivationLimitExceeded)
        );
    });

    assert_eq!(kernel.activation_count(HIGH), Some(4));
    let log = take_error_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].status, StatusType::ActivationLimitExceeded);
    assert_eq!(log[0].param, Some(HIGH.get()));
}

#[test]
fn task_services_are_rejected_in_handlers() {
    let kernel = new_kernel();
    kernel.start_os();

    run_interrupt(&kernel, InterruptCategory::Category2, |kernel| {
        assert_eq!(kernel.terminate_task(), Err(TerminateTaskError::CallLevel));
        assert_eq!(kernel.schedule(), Err(ScheduleError::CallLevel));
    });

    assert_eq!(kernel.running_task(), Some(LOW));
    assert_eq!(kernel.task_state(LOW), Ok(TaskState::Running));
    let statuses: Vec<_> = take_error_log().iter().map(|info| info.status).collect();
    assert_eq!(statuses, [StatusType::CallLevel, StatusType::CallLevel]);
}

#[test]
fn non_preemptible_task_is_not_preempted_by_handler() {
    let kernel = new_kernel();
    kernel.start_os();
    kernel.activate_task(COOPERATIVE).unwrap();
    assert_eq!(kernel.running_task(), Some(COOPERATIVE));

    run_interrupt(&kernel, InterruptCategory::Category2, |kernel| {
        kernel.activate_task(HIGH).unwrap();
    });
    assert_eq!(kernel.running_task(), Some(COOPERATIVE));

    kernel.schedule().unwrap();
    assert_eq!(kernel.running_task(), Some(HIGH));
    assert_eq!(kernel.task_state(COOPERATIVE), Ok(TaskState::Ready));
    assert_entry_invariant(&kernel);
}

#[test]
fn category1_handler_is_invisible_to_kernel() {
    let kernel = new_kernel();
    kernel.start_os();

    run_interrupt(&kernel, InterruptCategory::Category1, |kernel| {
        assert_eq!(
            kernel.calling_context(),
            CallingContext::InterruptCategory1
        );
    });
    assert_eq!(kernel.running_task(), Some(LOW));
}

#[test]
#[should_panic(expected = "interrupts are masked")]
fn interrupt_during_cpu_lock() {
    use osek_kernel::Port;

    let kernel = new_kernel();
    unsafe { kernel.traits().enter_cpu_lock() };
    run_interrupt(&kernel, InterruptCategory::Category2, |_| {});
}
