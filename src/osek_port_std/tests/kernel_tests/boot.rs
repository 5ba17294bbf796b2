//! `StartOS`
use osek_core::{TaskId, TaskState};
use osek_kernel::cfg::{CfgBuilder, TaskDefiner};
use osek_port_std::{take_dispatch_log, Dispatch};

use crate::assert_entry_invariant;

const T0: TaskId = TaskId::new(0);
const T1: TaskId = TaskId::new(1);
const T2: TaskId = TaskId::new(2);

crate::define_system!(CfgBuilder::new()
    .num_priority_levels(8)
    .task(TaskDefiner::new().priority(4).autostart(true))
    .task(TaskDefiner::new().priority(4).max_activations(2).autostart(true))
    .task(TaskDefiner::new().priority(1)));

#[test]
fn autostart_tasks_are_dispatched() {
    let kernel = new_kernel();
    assert_eq!(kernel.running_task(), None);
    assert_eq!(kernel.task_state(T0), Ok(TaskState::Suspended));

    kernel.start_os();
    assert_eq!(kernel.running_task(), Some(T0));
    assert_eq!(kernel.task_state(T1), Ok(TaskState::Ready));
    assert_eq!(kernel.task_state(T2), Ok(TaskState::Suspended));
    assert_eq!(
        take_dispatch_log(&kernel),
        [Dispatch {
            from: None,
            to: Some(T0)
        }]
    );
    assert_entry_invariant(&kernel);

    // Autostart tasks of the same priority run in identifier order
    kernel.terminate_task().unwrap();
    assert_eq!(kernel.running_task(), Some(T1));
    kernel.terminate_task().unwrap();
    assert_eq!(kernel.running_task(), None);
    assert_eq!(
        take_dispatch_log(&kernel),
        [
            Dispatch {
                from: Some(T0),
                to: Some(T1)
            },
            Dispatch {
                from: Some(T1),
                to: None
            },
        ]
    );
}

#[test]
fn activation_before_start_is_deferred() {
    let kernel = new_kernel();
    kernel.activate_task(T2).unwrap();
    kernel.activate_task(T1).unwrap();
    assert_eq!(kernel.task_state(T2), Ok(TaskState::Ready));
    assert_eq!(kernel.running_task(), None);
    assert!(take_dispatch_log(&kernel).is_empty());

    // `T1`'s autostart activation is queued behind the early one
    kernel.start_os();
    assert_eq!(kernel.running_task(), Some(T2));
    assert_eq!(kernel.activation_count(T1), Some(2));
    assert_entry_invariant(&kernel);

    kernel.terminate_task().unwrap();
    assert_eq!(kernel.running_task(), Some(T1));
}

#[test]
fn services_before_start() {
    let kernel = new_kernel();
    assert_eq!(kernel.schedule(), Ok(()));
    assert!(kernel.terminate_task().is_err());
    assert_eq!(kernel.ready_queue_len(), 0);
}

mod empty {
    use osek_kernel::cfg::CfgBuilder;
    use osek_port_std::take_dispatch_log;

    crate::define_system!(CfgBuilder::new());

    #[test]
    fn start_without_tasks() {
        let kernel = new_kernel();
        kernel.start_os();
        assert_eq!(kernel.running_task(), None);
        assert_eq!(kernel.num_tasks(), 0);
        assert!(take_dispatch_log(&kernel).is_empty());
    }
}
