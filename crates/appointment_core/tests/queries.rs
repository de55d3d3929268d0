use appointment_core::{
    Appointment, AppointmentRepository, Customer, Provider, ProviderType, RepoError, SqliteStorage,
};
use chrono::{NaiveDate, NaiveDateTime};

fn setup() -> AppointmentRepository<SqliteStorage> {
    AppointmentRepository::open_in_memory().unwrap()
}

fn at(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn seed_customers(repo: &mut AppointmentRepository<SqliteStorage>) {
    for customer in [
        Customer::with_name("sam@example.com", "Sam", "Smithers"),
        Customer::with_name("ann@example.com", "Ann", "Smith"),
        Customer::with_name("bob@example.com", "Bob", "Blacksmith"),
        Customer::with_name("eve@example.com", "Eve", "Jones"),
    ] {
        assert!(repo.create_customer(&customer).unwrap());
    }
}

fn emails(customers: &[Customer]) -> Vec<&str> {
    customers.iter().map(|customer| customer.email.as_str()).collect()
}

#[test]
fn find_customers_by_lastname_is_case_insensitive_and_ordered() {
    let mut repo = setup();
    seed_customers(&mut repo);

    let found = repo.find_customers_by("SMITH", None).unwrap();
    assert_eq!(
        emails(&found),
        vec!["bob@example.com", "ann@example.com", "sam@example.com"]
    );
}

#[test]
fn find_customers_by_lastname_and_firstname() {
    let mut repo = setup();
    seed_customers(&mut repo);

    let found = repo.find_customers_by("smith", Some("aN")).unwrap();
    assert_eq!(emails(&found), vec!["ann@example.com"]);

    let none = repo.find_customers_by("jones", Some("ann")).unwrap();
    assert!(none.is_empty());
}

#[test]
fn blank_firstname_filters_by_lastname_only() {
    let mut repo = setup();
    seed_customers(&mut repo);

    let found = repo.find_customers_by("jones", Some("")).unwrap();
    assert_eq!(emails(&found), vec!["eve@example.com"]);
}

#[test]
fn contains_matching_folds_non_ascii_case() {
    let mut repo = setup();
    repo.create_customer(&Customer::with_name("jm@example.com", "JÖRG", "MÜLLER"))
        .unwrap();
    repo.create_customer(&Customer::with_name("mu@example.com", "Jörg", "Muller"))
        .unwrap();

    let found = repo.find_customers_by("müller", None).unwrap();
    assert_eq!(emails(&found), vec!["jm@example.com"]);
    let found = repo.find_customers_by("Müll", Some("jörg")).unwrap();
    assert_eq!(emails(&found), vec!["jm@example.com"]);

    let mut provider = Provider::new(ProviderType::Doctor, "ÄUSSERE STRAẞE 1");
    let mut slots = vec![Appointment::new(at(2032, 3, 1, 9))];
    repo.create_provider(&mut provider, &mut slots).unwrap();

    let providers = repo
        .find_providers_by(Some(ProviderType::Doctor), Some("äussere straße"))
        .unwrap();
    assert_eq!(providers, vec![provider]);
    assert_eq!(repo.find_appointments_at(Some("straße")).unwrap(), slots);
}

#[test]
fn find_appointments_rejects_sub_microsecond_bounds() {
    let repo = setup();
    let bound = NaiveDate::from_ymd_opt(2032, 1, 1)
        .unwrap()
        .and_hms_nano_opt(9, 0, 0, 1)
        .unwrap();

    let err = repo.find_appointments(Some(bound), None).unwrap_err();
    assert!(matches!(err, RepoError::InvalidArgument(_)));
    let err = repo.find_appointments(None, Some(bound)).unwrap_err();
    assert!(matches!(err, RepoError::InvalidArgument(_)));
}

#[test]
fn find_appointments_window_respects_microseconds() {
    let mut repo = setup();
    let day = NaiveDate::from_ymd_opt(2032, 7, 1).unwrap();
    let mut provider = Provider::new(ProviderType::Dentist, "Harbour Road 7");
    let mut slots = vec![
        Appointment::new(day.and_hms_micro_opt(9, 0, 0, 500).unwrap()),
        Appointment::new(day.and_hms_micro_opt(9, 0, 0, 1_500).unwrap()),
    ];
    repo.create_provider(&mut provider, &mut slots).unwrap();

    let found = repo
        .find_appointments(
            Some(day.and_hms_micro_opt(9, 0, 0, 501).unwrap()),
            Some(day.and_hms_micro_opt(9, 0, 0, 1_500).unwrap()),
        )
        .unwrap();
    assert_eq!(found, vec![slots[1].clone()]);
}

#[test]
fn find_customers_by_blank_lastname_is_invalid_argument() {
    let repo = setup();

    let err = repo.find_customers_by("", None).unwrap_err();
    assert!(matches!(err, RepoError::InvalidArgument(_)));
    let err = repo.find_customers_by("  ", Some("Ann")).unwrap_err();
    assert!(matches!(err, RepoError::InvalidArgument(_)));
}

#[test]
fn find_customers_treats_wildcards_literally() {
    let mut repo = setup();
    repo.create_customer(&Customer::with_name("pct@example.com", "P", "100%_Sure"))
        .unwrap();
    repo.create_customer(&Customer::with_name("plain@example.com", "Q", "100 Sure"))
        .unwrap();

    let found = repo.find_customers_by("0%_", None).unwrap();
    assert_eq!(emails(&found), vec!["pct@example.com"]);
    assert!(repo.find_customers_by("%", None).unwrap().len() == 1);
}

#[test]
fn find_providers_by_type_and_address() {
    let mut repo = setup();
    let mut doctor = Provider::new(ProviderType::Doctor, "12 Harbour Road");
    let mut dentist = Provider::new(ProviderType::Dentist, "14 Harbour Road");
    let mut elsewhere = Provider::new(ProviderType::Doctor, "3 Hill Street");
    for provider in [&mut doctor, &mut dentist, &mut elsewhere] {
        assert!(repo.create_provider(provider, &mut []).unwrap());
    }

    let found = repo
        .find_providers_by(Some(ProviderType::Doctor), Some("harbour"))
        .unwrap();
    assert_eq!(found, vec![doctor.clone()]);

    let all_doctors = repo
        .find_providers_by(Some(ProviderType::Doctor), Some(""))
        .unwrap();
    assert_eq!(all_doctors, vec![doctor, elsewhere]);

    assert!(repo.find_providers_by(None, Some("harbour")).unwrap().is_empty());
    assert!(repo
        .find_providers_by(Some(ProviderType::Dentist), None)
        .unwrap()
        .is_empty());
}

#[test]
fn find_appointments_at_matches_provider_address() {
    let mut repo = setup();
    let mut harbour = Provider::new(ProviderType::Doctor, "12 Harbour Road");
    let mut harbour_slots = vec![
        Appointment::new(at(2032, 1, 10, 14)),
        Appointment::new(at(2032, 1, 10, 9)),
    ];
    repo.create_provider(&mut harbour, &mut harbour_slots).unwrap();

    let mut hill = Provider::new(ProviderType::Dentist, "3 Hill Street");
    let mut hill_slots = vec![Appointment::new(at(2032, 1, 10, 8))];
    repo.create_provider(&mut hill, &mut hill_slots).unwrap();

    let found = repo.find_appointments_at(Some("HARBOUR")).unwrap();
    assert_eq!(found, vec![harbour_slots[1].clone(), harbour_slots[0].clone()]);

    assert!(repo.find_appointments_at(Some("nowhere")).unwrap().is_empty());
    assert!(repo.find_appointments_at(None).unwrap().is_empty());
    assert_eq!(repo.find_appointments_at(Some("")).unwrap().len(), 3);
}

#[test]
fn find_appointments_within_window_is_inclusive_and_ordered() {
    let mut repo = setup();
    let mut provider = Provider::new(ProviderType::Hairdresser, "Market Square 2");
    let mut slots = vec![
        Appointment::new(at(2032, 5, 3, 12)),
        Appointment::new(at(2032, 5, 1, 9)),
        Appointment::new(at(2032, 5, 2, 10)),
        Appointment::new(at(2032, 6, 1, 9)),
        Appointment::unscheduled(),
    ];
    repo.create_provider(&mut provider, &mut slots).unwrap();

    let found = repo
        .find_appointments(Some(at(2032, 5, 1, 9)), Some(at(2032, 5, 3, 12)))
        .unwrap();
    let times: Vec<_> = found.iter().map(|appointment| appointment.time).collect();
    assert_eq!(
        times,
        vec![
            Some(at(2032, 5, 1, 9)),
            Some(at(2032, 5, 2, 10)),
            Some(at(2032, 5, 3, 12)),
        ]
    );
}

#[test]
fn find_appointments_defaults_open_bounds() {
    let mut repo = setup();
    let mut provider = Provider::new(ProviderType::Therapist, "Old Lane 3");
    let mut slots = vec![
        Appointment::new(at(1999, 12, 31, 23)),
        Appointment::new(at(2010, 1, 1, 8)),
        Appointment::new(at(2999, 12, 31, 8)),
        Appointment::new(at(3001, 1, 1, 8)),
        Appointment::unscheduled(),
    ];
    repo.create_provider(&mut provider, &mut slots).unwrap();

    let everything = repo.find_appointments(None, None).unwrap();
    assert_eq!(everything, vec![slots[1].clone(), slots[2].clone()]);

    let until_2020 = repo.find_appointments(None, Some(at(2020, 1, 1, 0))).unwrap();
    assert_eq!(until_2020, vec![slots[1].clone()]);

    let from_2020 = repo.find_appointments(Some(at(2020, 1, 1, 0)), None).unwrap();
    assert_eq!(from_2020, vec![slots[2].clone()]);

    let inverted = repo
        .find_appointments(Some(at(2020, 1, 1, 0)), Some(at(2010, 1, 1, 0)))
        .unwrap();
    assert!(inverted.is_empty());
}

#[test]
fn get_appointments_for_lists_only_held_slots() {
    let mut repo = setup();
    let ann = Customer::new("ann@example.com");
    let bob = Customer::new("bob@example.com");
    repo.create_customer(&ann).unwrap();
    repo.create_customer(&bob).unwrap();

    let mut provider = Provider::new(ProviderType::Doctor, "Main Street 1");
    let mut slots = vec![
        Appointment::new(at(2032, 2, 1, 9)),
        Appointment::new(at(2032, 2, 1, 10)),
        Appointment::new(at(2032, 2, 1, 11)),
    ];
    repo.create_provider(&mut provider, &mut slots).unwrap();
    repo.reserve(&mut slots[0], &ann).unwrap();
    repo.reserve(&mut slots[2], &ann).unwrap();
    repo.reserve(&mut slots[1], &bob).unwrap();

    let held = repo.get_appointments_for(&ann).unwrap();
    assert_eq!(held, vec![slots[0].clone(), slots[2].clone()]);
    assert!(repo
        .get_appointments_for(&Customer::new("nobody@example.com"))
        .unwrap()
        .is_empty());
    assert!(repo.get_appointments_for(&Customer::new("")).unwrap().is_empty());
}

#[test]
fn provider_serializes_kind_as_type_field() {
    let provider = Provider::new(ProviderType::Hairdresser, "Market Square 2");

    let json = serde_json::to_value(&provider).unwrap();
    assert_eq!(json["type"], "hairdresser");
    assert_eq!(json["address"], "Market Square 2");

    let back: Provider = serde_json::from_value(json).unwrap();
    assert_eq!(back, provider);
}
