mod common;

use std::time::Duration;

use cadence_kernel::{
    CommandExt, ConditionalCommand, InstantCommand, ManualClock, Scheduler, SelectCommand,
    WaitCommand, WaitUntilCommand,
};
use common::{init_tracing, lines, Flag, Journal, Mechanism, Probe};

fn scheduler_with(clock: &ManualClock) -> Scheduler {
    init_tracing();
    Scheduler::with_clock(clock.clone())
}

#[test]
fn timeout_interrupts_the_inner_command_once_elapsed() {
    let clock = ManualClock::new();
    let journal = Journal::new();
    let mut scheduler = scheduler_with(&clock);
    let id = scheduler.add_command(Probe::new("x", &journal).with_timeout(Duration::from_secs(2)));
    scheduler.schedule(id);

    clock.advance(Duration::from_secs(1));
    scheduler.run();
    assert!(scheduler.is_scheduled(&[id]));

    clock.advance(Duration::from_secs(1));
    scheduler.run();
    assert!(!scheduler.is_scheduled(&[id]));
    assert_eq!(
        journal.lines(),
        lines(&["x:init", "x:exec", "x:exec", "x:interrupted"])
    );
}

#[test]
fn timeout_passes_through_a_normal_finish() {
    let clock = ManualClock::new();
    let journal = Journal::new();
    let mut scheduler = scheduler_with(&clock);
    let id = scheduler.add_command(
        Probe::new("x", &journal)
            .finishing_after(1)
            .with_timeout(Duration::from_secs(5)),
    );
    scheduler.schedule(id);
    scheduler.run();
    assert_eq!(journal.lines(), lines(&["x:init", "x:exec", "x:end"]));
}

#[test]
fn until_interrupts_the_inner_command_when_the_condition_holds() {
    let clock = ManualClock::new();
    let journal = Journal::new();
    let stop = Flag::new();
    let mut scheduler = scheduler_with(&clock);
    let id = scheduler.add_command(Probe::new("x", &journal).until(stop.reader()));
    scheduler.schedule(id);
    scheduler.run();
    stop.set(true);
    scheduler.run();

    assert!(!scheduler.is_scheduled(&[id]));
    assert_eq!(
        journal.lines(),
        lines(&["x:init", "x:exec", "x:exec", "x:interrupted"])
    );
}

#[test]
fn perpetually_never_finishes() {
    let clock = ManualClock::new();
    let journal = Journal::new();
    let mut scheduler = scheduler_with(&clock);
    let id = scheduler.add_command(Probe::new("x", &journal).finishing_after(1).perpetually());
    scheduler.schedule(id);
    for _ in 0..5 {
        scheduler.run();
    }
    assert!(scheduler.is_scheduled(&[id]));
    assert_eq!(journal.count("x:exec"), 5);
    scheduler.cancel(id);
    assert_eq!(journal.lines().last().map(String::as_str), Some("x:interrupted"));
}

#[test]
fn before_starting_runs_at_schedule_time() {
    let clock = ManualClock::new();
    let journal = Journal::new();
    let mut scheduler = scheduler_with(&clock);
    let ran = Flag::new();
    let marker = ran.clone();
    let id = scheduler.add_command(Probe::new("x", &journal).before_starting(move || marker.set(true)));
    scheduler.schedule(id);
    assert!(ran.get());
    assert!(journal.lines().is_empty());

    scheduler.run();
    assert_eq!(journal.lines(), lines(&["x:init"]));
}

#[test]
fn and_then_run_fires_in_the_tick_the_command_ends() {
    let clock = ManualClock::new();
    let journal = Journal::new();
    let mut scheduler = scheduler_with(&clock);
    let after = journal.clone();
    let id = scheduler.add_command(
        Probe::new("x", &journal)
            .finishing_after(1)
            .and_then_run(move || after.record("after")),
    );
    scheduler.schedule(id);
    scheduler.run();
    assert_eq!(journal.lines(), lines(&["x:init", "x:exec", "x:end", "after"]));
    scheduler.run();
    assert!(!scheduler.is_scheduled(&[id]));
}

#[test]
fn and_then_chains_commands() {
    let clock = ManualClock::new();
    let journal = Journal::new();
    let mut scheduler = scheduler_with(&clock);
    let id = scheduler.add_command(
        Probe::new("a", &journal)
            .finishing_after(1)
            .and_then(Probe::new("b", &journal).finishing_after(1)),
    );
    scheduler.schedule(id);
    scheduler.run();
    scheduler.run();
    assert!(!scheduler.is_scheduled(&[id]));
    assert_eq!(journal.count("b:end"), 1);
}

#[test]
fn overrides_change_scheduling_behavior() {
    let clock = ManualClock::new();
    let journal = Journal::new();
    let mut scheduler = scheduler_with(&clock);
    let arm = scheduler.register_subsystem(Mechanism::default());

    let locked = scheduler.add_command(
        Probe::new("locked", &journal)
            .needs(&[arm])
            .with_interruptible(false)
            .with_name("hold-arm"),
    );
    assert_eq!(scheduler.command_name(locked), Some("hold-arm"));
    let other = scheduler.add_command(Probe::new("other", &journal).needs(&[arm]));
    scheduler.schedule(locked);
    scheduler.schedule(other);
    assert!(!scheduler.is_scheduled(&[other]));

    let steady = scheduler.add_command(Probe::new("steady", &journal).ignoring_disable(true));
    scheduler.schedule(steady);
    scheduler.set_enabled(false);
    scheduler.run();
    assert!(scheduler.is_scheduled(&[steady]));
    assert!(!scheduler.is_scheduled(&[locked]));
}

#[test]
fn requiring_adds_claims_on_top_of_the_inner_command() {
    let clock = ManualClock::new();
    let journal = Journal::new();
    let mut scheduler = scheduler_with(&clock);
    let arm = scheduler.register_subsystem(Mechanism::default());
    let wrist = scheduler.register_subsystem(Mechanism::default());
    let command = Probe::new("x", &journal).needs(&[arm]).requiring([wrist]).unwrap();
    let id = scheduler.add_command(command);
    scheduler.schedule(id);
    assert_eq!(scheduler.requiring(arm), Some(id));
    assert_eq!(scheduler.requiring(wrist), Some(id));

    assert!(Probe::new("y", &journal).needs(&[arm]).requiring([arm]).is_err());
}

#[test]
fn wait_commands_follow_clock_and_condition() {
    let clock = ManualClock::new();
    let mut scheduler = scheduler_with(&clock);
    let wait = scheduler.add_command(WaitCommand::new(Duration::from_millis(100)));
    let gate = Flag::new();
    let until = scheduler.add_command(WaitUntilCommand::new(gate.reader()));
    scheduler.schedule_all(&[wait, until]);

    clock.advance(Duration::from_millis(60));
    scheduler.run();
    assert!(scheduler.is_scheduled(&[wait, until]));

    clock.advance(Duration::from_millis(40));
    gate.set(true);
    scheduler.run();
    assert!(!scheduler.is_scheduled(&[wait]));
    assert!(!scheduler.is_scheduled(&[until]));
}

#[test]
fn conditional_and_select_pick_one_branch() {
    let clock = ManualClock::new();
    let journal = Journal::new();
    let mut scheduler = scheduler_with(&clock);
    let (yes, no) = (journal.clone(), journal.clone());
    let conditional = scheduler.add_command(ConditionalCommand::new(
        InstantCommand::new(move || yes.record("yes")).boxed(),
        InstantCommand::new(move || no.record("no")).boxed(),
        || true,
    ));
    scheduler.schedule(conditional);
    scheduler.run();

    let select = scheduler.add_command(SelectCommand::new(
        || "right",
        [
            ("left", Probe::new("left", &journal).finishing_after(1).boxed()),
            ("right", Probe::new("right", &journal).finishing_after(1).boxed()),
        ],
    ));
    scheduler.schedule(select);
    scheduler.run();

    assert_eq!(
        journal.lines(),
        lines(&["yes", "right:init", "right:exec", "right:end"])
    );
    assert!(!scheduler.is_scheduled(&[conditional, select]));
}
