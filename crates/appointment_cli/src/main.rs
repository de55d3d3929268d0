//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open the store from `APPOINTMENT_*` configuration and run one short
//!   create/reserve/query/cancel scenario against it.
//! - Print a deterministic summary for quick local sanity checks.

use appointment_core::{
    core_version, init_logging_from, Appointment, AppointmentRepository, Customer, Provider,
    ProviderType, RepoError, StoreConfig,
};
use chrono::{Duration, NaiveDate};
use log::info;
use std::fmt::{Display, Formatter};
use std::process::ExitCode;

const DEMO_EMAIL: &str = "smoke@example.com";

/// Failure of the smoke scenario.
#[derive(Debug)]
enum SmokeError {
    /// The fixed demo start time is not a valid calendar time.
    DemoTime,
    Repo(RepoError),
}

impl SmokeError {
    fn code(&self) -> &'static str {
        match self {
            Self::DemoTime => "demo_time_invalid",
            Self::Repo(err) => err.code(),
        }
    }
}

impl Display for SmokeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DemoTime => write!(f, "demo start time is not a valid date"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl From<RepoError> for SmokeError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

fn main() -> ExitCode {
    let config = match StoreConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error, using defaults: {err}");
            StoreConfig::default()
        }
    };

    if let Err(err) = init_logging_from(&config) {
        eprintln!("logging disabled: {err}");
    }

    println!("appointment_core version={}", core_version());
    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("smoke run failed ({}): {err}", err.code());
            ExitCode::FAILURE
        }
    }
}

fn run(config: &StoreConfig) -> Result<(), SmokeError> {
    let mut repo = AppointmentRepository::open(config)?;
    let store = config
        .database_path
        .as_ref()
        .map_or_else(|| "memory".to_string(), |path| path.display().to_string());
    println!("store={store}");

    let customer = Customer::with_name(DEMO_EMAIL, "Smoke", "Tester");
    let created = repo.create_customer(&customer)?;
    println!("customer created={created}");

    let start = NaiveDate::from_ymd_opt(2030, 1, 7)
        .and_then(|day| day.and_hms_opt(9, 0, 0))
        .ok_or(SmokeError::DemoTime)?;
    let mut provider = Provider::new(ProviderType::Doctor, "1 Smoke Street");
    let mut slots = vec![
        Appointment::new(start),
        Appointment::new(start + Duration::minutes(30)),
    ];
    repo.create_provider(&mut provider, &mut slots)?;
    println!(
        "provider id={} appointments={}",
        provider.id.unwrap_or_default(),
        slots.len()
    );

    let reserved = repo.reserve(&mut slots[0], &customer)?;
    let held = repo.get_appointments_for(&customer)?;
    println!("reserve ok={reserved} held={}", held.len());

    let at_street = repo.find_appointments_at(Some("smoke street"))?;
    let window = repo.find_appointments(Some(start), Some(start + Duration::hours(1)))?;
    println!(
        "query at_address={} in_window={}",
        at_street.len(),
        window.len()
    );

    let cancelled = repo.cancel(&mut slots[0], &customer)?;
    println!("cancel ok={cancelled} state={:?}", slots[0].reservation_state());

    repo.delete_provider(&provider)?;
    repo.close();
    info!("event=smoke_run module=cli status=ok");
    Ok(())
}
