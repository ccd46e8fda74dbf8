use std::cell::Cell;
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

use cadence_kernel::{RunCommand, Scheduler};
use cadence_runtime::{load_config, ConfigError, DriverConfig, PeriodicDriver};

fn counting_driver(period_ms: u64) -> (PeriodicDriver, Rc<Cell<u32>>) {
    let counter = Rc::new(Cell::new(0));
    let sink = counter.clone();
    let mut driver = PeriodicDriver::new(
        Scheduler::new(),
        DriverConfig {
            period_ms,
            start_enabled: true,
            overrun_warning: false,
        },
    );
    let id = driver
        .scheduler_mut()
        .add_command(RunCommand::new(move || sink.set(sink.get() + 1)));
    driver.scheduler_mut().schedule(id);
    (driver, counter)
}

#[tokio::test(start_paused = true)]
async fn run_for_ticks_once_per_period() {
    let (mut driver, counter) = counting_driver(20);
    let started = tokio::time::Instant::now();
    let stats = driver.run_for(5).await;

    assert_eq!(stats.ticks, 5);
    assert_eq!(counter.get(), 5);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(80), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(100), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn run_until_stops_when_the_signal_fires() {
    let (mut driver, counter) = counting_driver(20);
    let stats = driver
        .run_until(tokio::time::sleep(Duration::from_millis(100)))
        .await;

    assert!((5..=6).contains(&stats.ticks), "ticks {}", stats.ticks);
    assert_eq!(u64::from(counter.get()), stats.ticks);
    assert_eq!(stats.last_report.map(|report| report.tick), Some(stats.ticks));
}

#[test]
fn load_config_reads_a_toml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[driver]\nperiod_ms = 10\nstart_enabled = true").unwrap();
    let config = load_config(file.path()).unwrap();
    assert_eq!(config.driver.period(), Duration::from_millis(10));

    let driver = PeriodicDriver::from_config(Scheduler::new(), &config).unwrap();
    assert!(driver.scheduler().is_enabled());
}

#[test]
fn load_config_reports_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
