//! Preemption, `Schedule`, and `ChainTask`
use osek_core::{ChainTaskError, TaskId, TaskState};
use osek_kernel::cfg::{CfgBuilder, TaskDefiner};
use osek_port_std::{take_dispatch_log, Dispatch};

use crate::assert_entry_invariant;

const T0: TaskId = TaskId::new(0);
const T1: TaskId = TaskId::new(1);
const T2: TaskId = TaskId::new(2);
const T3: TaskId = TaskId::new(3);
const T4: TaskId = TaskId::new(4);

crate::define_system!(CfgBuilder::new()
    .num_priority_levels(16)
    .task(TaskDefiner::new().priority(5).max_activations(3))
    .task(TaskDefiner::new().priority(5).max_activations(2))
    .task(TaskDefiner::new().priority(10))
    .task(TaskDefiner::new().priority(3))
    .task(TaskDefiner::new().priority(12).preemptible(false)));

fn switch(from: Option<TaskId>, to: Option<TaskId>) -> Dispatch {
    Dispatch { from, to }
}

#[test]
fn more_urgent_task_preempts() {
    let kernel = new_kernel();
    kernel.start_os();
    kernel.activate_task(T2).unwrap();
    assert_eq!(kernel.task_state(T2), Ok(TaskState::Running));

    // From `T2`'s context
    kernel.activate_task(T3).unwrap();
    assert_eq!(kernel.task_state(T2), Ok(TaskState::Ready));
    assert_eq!(kernel.task_state(T3), Ok(TaskState::Running));
    assert_eq!(kernel.ready_queue_count_for(T2), Some(1));
    assert_eq!(
        take_dispatch_log(&kernel),
        [switch(None, Some(T2)), switch(Some(T2), Some(T3))]
    );
    assert_entry_invariant(&kernel);
}

#[test]
fn less_urgent_task_does_not_preempt() {
    let kernel = new_kernel();
    kernel.start_os();
    kernel.activate_task(T3).unwrap();
    kernel.activate_task(T2).unwrap();
    assert_eq!(kernel.running_task(), Some(T3));
    assert_eq!(kernel.task_state(T2), Ok(TaskState::Ready));
}

#[test]
fn equal_priority_is_fifo() {
    let kernel = new_kernel();
    kernel.start_os();
    kernel.activate_task(T3).unwrap();

    kernel.activate_task(T0).unwrap();
    kernel.activate_task(T1).unwrap();
    kernel.activate_task(T0).unwrap();
    kernel.activate_task(T1).unwrap();
    take_dispatch_log(&kernel);

    let mut order = Vec::new();
    while kernel.running_task().is_some() {
        kernel.terminate_task().unwrap();
        order.extend(kernel.running_task());
    }
    assert_eq!(order, [T0, T1, T0, T1]);
}

#[test]
fn equal_priority_does_not_preempt() {
    let kernel = new_kernel();
    kernel.start_os();
    kernel.activate_task(T0).unwrap();
    kernel.activate_task(T1).unwrap();
    assert_eq!(kernel.running_task(), Some(T0));
}

#[test]
fn preempted_task_reenters_at_tail() {
    let kernel = new_kernel();
    kernel.start_os();
    kernel.activate_task(T0).unwrap();
    kernel.activate_task(T1).unwrap();

    // `T0` is preempted while `T1` is waiting at the same priority
    kernel.activate_task(T3).unwrap();
    kernel.terminate_task().unwrap();
    assert_eq!(kernel.running_task(), Some(T1));
    kernel.terminate_task().unwrap();
    assert_eq!(kernel.running_task(), Some(T0));
}

#[test]
fn non_preemptible_task_yields_at_schedule() {
    let kernel = new_kernel();
    kernel.start_os();
    kernel.activate_task(T4).unwrap();

    kernel.activate_task(T3).unwrap();
    kernel.activate_task(T2).unwrap();
    assert_eq!(kernel.running_task(), Some(T4));
    assert_eq!(kernel.task_state(T3), Ok(TaskState::Ready));

    kernel.schedule().unwrap();
    assert_eq!(kernel.running_task(), Some(T3));
    assert_eq!(kernel.task_state(T4), Ok(TaskState::Ready));
    assert_entry_invariant(&kernel);

    kernel.terminate_task().unwrap();
    assert_eq!(kernel.running_task(), Some(T2));
}

#[test]
fn schedule_without_more_urgent_task_keeps_running() {
    let kernel = new_kernel();
    kernel.start_os();
    kernel.activate_task(T3).unwrap();
    kernel.activate_task(T2).unwrap();
    take_dispatch_log(&kernel);

    kernel.schedule().unwrap();
    assert_eq!(kernel.running_task(), Some(T3));
    assert!(take_dispatch_log(&kernel).is_empty());
}

#[test]
fn chain_task_switches_atomically() {
    let kernel = new_kernel();
    kernel.start_os();
    kernel.activate_task(T3).unwrap();
    take_dispatch_log(&kernel);

    kernel.chain_task(T2).unwrap();
    assert_eq!(kernel.task_state(T3), Ok(TaskState::Suspended));
    assert_eq!(kernel.running_task(), Some(T2));
    assert_eq!(take_dispatch_log(&kernel), [switch(Some(T3), Some(T2))]);
    assert_entry_invariant(&kernel);
}

#[test]
fn chain_task_to_less_urgent_task_runs_queued_work_first() {
    let kernel = new_kernel();
    kernel.start_os();
    kernel.activate_task(T3).unwrap();
    kernel.activate_task(T0).unwrap();

    kernel.chain_task(T2).unwrap();
    assert_eq!(kernel.running_task(), Some(T0));
    assert_eq!(kernel.task_state(T2), Ok(TaskState::Ready));
}

#[test]
fn chain_task_rejects_full_target() {
    let kernel = new_kernel();
    kernel.start_os();
    kernel.activate_task(T3).unwrap();
    kernel.activate_task(T2).unwrap();

    assert_eq!(
        kernel.chain_task(T2),
        Err(ChainTaskError::ActivationLimitExceeded)
    );
    assert_eq!(
        kernel.chain_task(TaskId::new(99)),
        Err(ChainTaskError::InvalidId)
    );
    assert_eq!(kernel.running_task(), Some(T3));
    assert_eq!(kernel.activation_count(T3), Some(1));
    assert_entry_invariant(&kernel);
}

mod higher_is_more_urgent {
    use super::*;
    use osek_core::PriorityOrder;

    crate::define_system!(CfgBuilder::new()
        .priority_order(PriorityOrder::HigherIsMoreUrgent)
        .num_priority_levels(16)
        .task(TaskDefiner::new().priority(3))
        .task(TaskDefiner::new().priority(10)));

    #[test]
    fn numerically_higher_priority_preempts() {
        let kernel = new_kernel();
        kernel.start_os();
        kernel.activate_task(T0).unwrap();
        kernel.activate_task(T1).unwrap();
        assert_eq!(kernel.running_task(), Some(T1));
        assert_eq!(kernel.task_state(T0), Ok(TaskState::Ready));
    }
}

/// Random service sequences preserve the activation bookkeeping.
mod random {
    use super::*;
    use osek_port_std::{run_interrupt, InterruptCategory};
    use quickcheck_macros::quickcheck;

    /// A service call made by the running task or an interrupt handler.
    #[derive(Debug)]
    enum Cmd {
        Activate(TaskId),
        Terminate,
        Chain(TaskId),
        Schedule,
        ActivateFromInterrupt(TaskId),
    }

    /// Map random bytes to service calls.
    fn interpret(bytecode: &[u8], num_tasks: usize) -> impl Iterator<Item = Cmd> + '_ {
        bytecode.chunks_exact(2).map(move |instr| {
            let task = TaskId::new(usize::from(instr[1]) % num_tasks);
            match instr[0] % 5 {
                0 => Cmd::Activate(task),
                1 => Cmd::Terminate,
                2 => Cmd::Chain(task),
                3 => Cmd::Schedule,
                _ => Cmd::ActivateFromInterrupt(task),
            }
        })
    }

    /// Assert that no Ready task is more urgent than the running task. A
    /// non-preemptible running task is exempt unless it just called
    /// `schedule`.
    fn assert_running_task_is_most_urgent(
        kernel: &osek_kernel::Kernel<SystemTraits>,
        yielded: bool,
    ) {
        let Some(running) = kernel.running_task() else {
            assert_eq!(kernel.ready_queue_len(), 0);
            return;
        };
        let attr = kernel.task_attr(running).unwrap();
        if !attr.is_preemptible() && !yielded {
            return;
        }
        for i in 0..kernel.num_tasks() {
            let other = TaskId::new(i);
            if kernel.task_state(other) == Ok(TaskState::Ready) {
                assert!(kernel.task_attr(other).unwrap().level >= attr.level);
            }
        }
    }

    #[quickcheck]
    fn entry_invariant_holds(bytecode: Vec<u8>) {
        let kernel = new_kernel();
        kernel.start_os();

        for cmd in interpret(&bytecode, kernel.num_tasks()) {
            log::trace!("    {cmd:?}");
            let yielded = matches!(cmd, Cmd::Schedule);
            match cmd {
                Cmd::Activate(task) => {
                    let _ = kernel.activate_task(task);
                }
                Cmd::Terminate => {
                    let _ = kernel.terminate_task();
                }
                Cmd::Chain(task) => {
                    let _ = kernel.chain_task(task);
                }
                Cmd::Schedule => {
                    let _ = kernel.schedule();
                }
                Cmd::ActivateFromInterrupt(task) => {
                    run_interrupt(&kernel, InterruptCategory::Category2, |kernel| {
                        let _ = kernel.activate_task(task);
                    });
                }
            }

            assert_entry_invariant(&kernel);
            assert_running_task_is_most_urgent(&kernel, yielded);
        }

        crate::take_error_log();
    }
}
