use appointment_core::{
    Appointment, AppointmentRepository, Customer, Provider, ProviderType, RepoError,
    ReservationState, SqliteStorage, StoreError,
};
use chrono::NaiveDate;

struct Fixture {
    repo: AppointmentRepository<SqliteStorage>,
    ann: Customer,
    bob: Customer,
    slot: Appointment,
}

fn setup() -> Fixture {
    let mut repo = AppointmentRepository::open_in_memory().unwrap();
    let ann = Customer::with_name("ann@example.com", "Ann", "Smith");
    let bob = Customer::with_name("bob@example.com", "Bob", "Miller");
    repo.create_customer(&ann).unwrap();
    repo.create_customer(&bob).unwrap();

    let mut provider = Provider::new(ProviderType::Doctor, "Main Street 1");
    let time = NaiveDate::from_ymd_opt(2033, 9, 1)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap();
    let mut slots = vec![Appointment::new(time)];
    repo.create_provider(&mut provider, &mut slots).unwrap();

    Fixture {
        repo,
        ann,
        bob,
        slot: slots.remove(0),
    }
}

#[test]
fn reserve_then_cancel_walks_the_state_machine() {
    let Fixture {
        mut repo,
        ann,
        mut slot,
        ..
    } = setup();
    assert_eq!(slot.reservation_state(), ReservationState::Unreserved);

    assert!(repo.reserve(&mut slot, &ann).unwrap());
    assert_eq!(slot.reservation_state(), ReservationState::Reserved);
    assert_eq!(slot.customer_email.as_deref(), Some("ann@example.com"));
    assert_eq!(repo.get_appointments_for(&ann).unwrap(), vec![slot.clone()]);

    assert!(repo.cancel(&mut slot, &ann).unwrap());
    assert_eq!(slot.reservation_state(), ReservationState::Unreserved);
    assert!(repo.get_appointments_for(&ann).unwrap().is_empty());

    assert!(repo.reserve(&mut slot, &ann).unwrap());
}

#[test]
fn reserved_slot_cannot_be_taken_by_another_customer() {
    let Fixture {
        mut repo,
        ann,
        bob,
        mut slot,
    } = setup();
    let mut stale_copy = slot.clone();
    assert!(repo.reserve(&mut slot, &ann).unwrap());

    assert!(!repo.reserve(&mut stale_copy, &bob).unwrap());
    assert!(!repo.reserve(&mut slot, &ann).unwrap());

    let stored = repo.read_appointment(slot.id.unwrap()).unwrap().unwrap();
    assert_eq!(stored.customer_email.as_deref(), Some("ann@example.com"));
    assert!(repo.get_appointments_for(&bob).unwrap().is_empty());
}

#[test]
fn cancel_is_rejected_unless_caller_holds_the_slot() {
    let Fixture {
        mut repo,
        ann,
        bob,
        mut slot,
    } = setup();

    assert!(!repo.cancel(&mut slot, &ann).unwrap());

    assert!(repo.reserve(&mut slot, &ann).unwrap());
    let mut bobs_view = slot.clone();
    assert!(!repo.cancel(&mut bobs_view, &bob).unwrap());
    assert_eq!(bobs_view, slot);

    let stored = repo.read_appointment(slot.id.unwrap()).unwrap().unwrap();
    assert!(stored.is_reserved());
}

#[test]
fn reserve_requires_stored_appointment_and_known_customer() {
    let Fixture {
        mut repo,
        ann,
        mut slot,
        ..
    } = setup();

    let mut unsaved = Appointment::unscheduled();
    assert!(!repo.reserve(&mut unsaved, &ann).unwrap());

    let mut vanished = slot.clone();
    vanished.id = Some(9_999);
    assert!(!repo.reserve(&mut vanished, &ann).unwrap());

    assert!(!repo.reserve(&mut slot, &Customer::new("")).unwrap());
    assert!(!repo
        .reserve(&mut slot, &Customer::new("stranger@example.com"))
        .unwrap());
    assert!(!slot.is_reserved());
}

#[test]
fn closed_repository_rejects_further_operations() {
    let Fixture {
        mut repo,
        ann,
        mut slot,
        ..
    } = setup();

    assert!(repo.is_open());
    repo.close();
    repo.close();
    assert!(!repo.is_open());

    let err = repo.read_customer("ann@example.com").unwrap_err();
    assert!(matches!(err, RepoError::Store(StoreError::Closed)));
    let err = repo.reserve(&mut slot, &ann).unwrap_err();
    assert!(matches!(err, RepoError::Store(StoreError::Closed)));
    assert_eq!(err.code(), "store_closed");
    let err = repo.find_appointments(None, None).unwrap_err();
    assert!(matches!(err, RepoError::Store(StoreError::Closed)));
}
