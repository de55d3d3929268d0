//! Storage layout of the scheduling entities.
//!
//! Column names here must match `db/migrations`. Appointment times are stored
//! as Unix epoch microseconds (UTC), so range filters compare integers.

use super::{Entity, EntityKind, FieldValue, Record, StoreError, StoreResult};
use crate::model::appointment::Appointment;
use crate::model::customer::Customer;
use crate::model::provider::{Provider, ProviderId, ProviderType};
use chrono::{DateTime, NaiveDateTime, Timelike};

const MICROS_PER_SECOND: i64 = 1_000_000;

pub const CUSTOMER_EMAIL: &str = "email";
pub const CUSTOMER_FIRSTNAME: &str = "firstname";
pub const CUSTOMER_LASTNAME: &str = "lastname";

pub const PROVIDER_ID: &str = "id";
pub const PROVIDER_TYPE: &str = "type";
pub const PROVIDER_ADDRESS: &str = "address";

pub const APPOINTMENT_ID: &str = "id";
pub const APPOINTMENT_TIME: &str = "scheduled_at";
pub const APPOINTMENT_PROVIDER: &str = "provider_id";
pub const APPOINTMENT_CUSTOMER: &str = "customer_email";

/// Returns whether `time` survives storage unchanged, i.e. carries no
/// sub-microsecond part.
pub fn is_storable_time(time: NaiveDateTime) -> bool {
    time.nanosecond() % 1_000 == 0
}

/// Converts a scheduled time into its stored cell. Sub-microsecond parts are
/// truncated; callers check `is_storable_time` first.
pub fn time_value(time: NaiveDateTime) -> FieldValue {
    FieldValue::Integer(time.and_utc().timestamp_micros())
}

fn time_from_micros(micros: i64) -> StoreResult<NaiveDateTime> {
    let secs = micros.div_euclid(MICROS_PER_SECOND);
    let nanos = u32::try_from(micros.rem_euclid(MICROS_PER_SECOND) * 1_000).ok();
    nanos
        .and_then(|nanos| DateTime::from_timestamp(secs, nanos))
        .map(|time| time.naive_utc())
        .ok_or_else(|| {
            StoreError::InvalidData(format!(
                "timestamp {micros} out of range in appointments.{APPOINTMENT_TIME}"
            ))
        })
}

impl Entity for Customer {
    type Key = String;

    const KIND: EntityKind = EntityKind {
        name: "customer",
        table: "customers",
        key_column: CUSTOMER_EMAIL,
        columns: &[CUSTOMER_FIRSTNAME, CUSTOMER_LASTNAME],
    };

    fn key(&self) -> Option<String> {
        self.has_key().then(|| self.email.clone())
    }

    fn key_value(key: &String) -> FieldValue {
        FieldValue::Text(key.clone())
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![self.firstname.clone().into(), self.lastname.clone().into()]
    }

    fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self {
            email: record.key_text()?,
            firstname: record.opt_text(CUSTOMER_FIRSTNAME)?,
            lastname: record.opt_text(CUSTOMER_LASTNAME)?,
        })
    }
}

impl Entity for Provider {
    type Key = ProviderId;

    const KIND: EntityKind = EntityKind {
        name: "provider",
        table: "providers",
        key_column: PROVIDER_ID,
        columns: &[PROVIDER_TYPE, PROVIDER_ADDRESS],
    };

    fn key(&self) -> Option<ProviderId> {
        self.id
    }

    fn key_value(key: &ProviderId) -> FieldValue {
        FieldValue::Integer(*key)
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![self.kind.as_str().into(), self.address.as_str().into()]
    }

    fn from_record(record: &Record) -> StoreResult<Self> {
        let type_text = record.text(PROVIDER_TYPE)?;
        let kind = ProviderType::parse(&type_text).ok_or_else(|| {
            StoreError::InvalidData(format!(
                "invalid provider type `{type_text}` in providers.{PROVIDER_TYPE}"
            ))
        })?;

        Ok(Self {
            id: Some(record.key_integer()?),
            kind,
            address: record.text(PROVIDER_ADDRESS)?,
        })
    }
}

impl Entity for Appointment {
    type Key = i64;

    const KIND: EntityKind = EntityKind {
        name: "appointment",
        table: "appointments",
        key_column: APPOINTMENT_ID,
        columns: &[APPOINTMENT_TIME, APPOINTMENT_PROVIDER, APPOINTMENT_CUSTOMER],
    };

    fn key(&self) -> Option<i64> {
        self.id
    }

    fn key_value(key: &i64) -> FieldValue {
        FieldValue::Integer(*key)
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.time.map_or(FieldValue::Null, time_value),
            self.provider_id.into(),
            self.customer_email.clone().into(),
        ]
    }

    fn from_record(record: &Record) -> StoreResult<Self> {
        let time = record
            .opt_integer(APPOINTMENT_TIME)?
            .map(time_from_micros)
            .transpose()?;

        Ok(Self {
            id: Some(record.key_integer()?),
            time,
            provider_id: record.opt_integer(APPOINTMENT_PROVIDER)?,
            customer_email: record.opt_text(APPOINTMENT_CUSTOMER)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{
        is_storable_time, time_from_micros, time_value, APPOINTMENT_CUSTOMER, PROVIDER_TYPE,
    };
    use crate::model::appointment::Appointment;
    use crate::model::customer::Customer;
    use crate::model::provider::{Provider, ProviderType};
    use crate::store::{Entity, FieldValue, Record, StoreError};
    use chrono::NaiveDate;

    #[test]
    fn time_cells_use_epoch_micros() {
        let time = NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(time_value(time), FieldValue::Integer(946_684_800_000_000));
        assert_eq!(time_from_micros(946_684_800_000_000).unwrap(), time);
    }

    #[test]
    fn micro_precision_survives_and_finer_is_flagged() {
        let day = NaiveDate::from_ymd_opt(2031, 1, 1).unwrap();
        let micros = day.and_hms_micro_opt(9, 0, 0, 123_456).unwrap();
        let FieldValue::Integer(cell) = time_value(micros) else {
            panic!("time cell must be an integer");
        };
        assert_eq!(time_from_micros(cell).unwrap(), micros);
        assert!(is_storable_time(micros));

        let nanos = day.and_hms_nano_opt(9, 0, 0, 123_456_789).unwrap();
        assert!(!is_storable_time(nanos));
    }

    #[test]
    fn times_before_epoch_round_trip() {
        let time = NaiveDate::from_ymd_opt(1969, 12, 31)
            .unwrap()
            .and_hms_micro_opt(23, 59, 59, 999_999)
            .unwrap();
        assert_eq!(time_value(time), FieldValue::Integer(-1));
        assert_eq!(time_from_micros(-1).unwrap(), time);
    }

    #[test]
    fn blank_email_has_no_key() {
        assert_eq!(Customer::new(" ").key(), None);
        assert_eq!(
            Customer::new("ann@example.com").key().as_deref(),
            Some("ann@example.com")
        );
    }

    #[test]
    fn unknown_provider_type_is_invalid_data() {
        let record = Record::new(
            &Provider::KIND,
            FieldValue::Integer(1),
            vec![
                FieldValue::Text("plumber".to_string()),
                FieldValue::Text("Main St 1".to_string()),
            ],
        );

        let err = Provider::from_record(&record).unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(ref message) if message.contains(PROVIDER_TYPE)));
    }

    #[test]
    fn appointment_values_follow_column_order() {
        let mut appointment = Appointment::unscheduled();
        appointment.provider_id = Some(3);
        appointment.customer_email = Some("ann@example.com".to_string());

        let values = appointment.values();
        assert_eq!(values.len(), Appointment::KIND.columns.len());
        assert_eq!(values[0], FieldValue::Null);
        assert_eq!(values[1], FieldValue::Integer(3));
        assert_eq!(Appointment::KIND.columns[2], APPOINTMENT_CUSTOMER);

        let provider = Provider::new(ProviderType::Dentist, "Main St 1");
        assert_eq!(provider.values()[0], FieldValue::Text("dentist".to_string()));
    }
}
