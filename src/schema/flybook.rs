//! The flight logbook schema.

use crate::schema::{NamingConfig, Result, Schema, TableSpec};

const USERS: &[&str] = &[
    "username TEXT PRIMARY KEY",
    "passwd TEXT",
    "passwd_salt TEXT",
    "firstname TEXT",
    "lastname TEXT",
    "role TINYINT",
    "email TEXT",
    "optlock INTEGER @VERSION",
];

const FLIGHT_ENTRIES: &[&str] = &[
    "flight_id INTEGER PRIMARY KEY",
    "username TEXT REFERENCES Users (c_username)",
    "date DATETIME",
    "aircraft TEXT REFERENCES Aircrafts (c_register)",
    "departure_time DATETIME",
    "departure_airport INTEGER",
    "landing_time DATETIME",
    "landing_airport INTEGER",
    "onblock_time INTEGER",
    "offblock_time INTEGER",
    "flight_type INTEGER",
    "ifr_time TEXT",
    "notes TEXT",
    "optlock INTEGER @VERSION",
];

const AIRPORTS: &[&str] = &[
    "id INTEGER PRIMARY KEY",
    "code CHAR(4)",
    "country TEXT",
    "city TEXT",
    "name TEXT",
    "location TEXT",
    "optlock INTEGER @VERSION",
];

const AIRCRAFTS: &[&str] = &[
    "register TEXT PRIMARY KEY",
    "class INTEGER",
    "capacity INTEGER",
    "weight INTEGER",
    "optlock INTEGER @VERSION",
];

/// Build the logbook schema with the given naming.
pub fn flybook_schema_with(naming: NamingConfig) -> Result<Schema> {
    let tables = [
        ("Users", USERS),
        ("FlightEntries", FLIGHT_ENTRIES),
        ("Airports", AIRPORTS),
        ("Aircrafts", AIRCRAFTS),
    ]
    .iter()
    .map(|(name, columns)| TableSpec::from_descriptor(name, columns))
    .collect::<Result<Vec<_>>>()?;

    Schema::new(naming, tables)
}

/// The logbook schema with default naming (`c_` column prefix).
pub fn flybook_schema() -> Result<Schema> {
    flybook_schema_with(NamingConfig::default())
}

/// Table and column names of the logbook schema.
///
/// Generated by `flybook-db constants`.
pub mod constants {
    pub const TBLPREFIX: &str = "";
    pub const COLPREFIX: &str = "c_";

    pub const TABLE_USERS: &str = "Users";
    pub const TABLE_FLIGHTENTRIES: &str = "FlightEntries";
    pub const TABLE_AIRPORTS: &str = "Airports";
    pub const TABLE_AIRCRAFTS: &str = "Aircrafts";

    pub const USERS_USERNAME: &str = "c_username";
    pub const USERS_PASSWD: &str = "c_passwd";
    pub const USERS_PASSWD_SALT: &str = "c_passwd_salt";
    pub const USERS_FIRSTNAME: &str = "c_firstname";
    pub const USERS_LASTNAME: &str = "c_lastname";
    pub const USERS_ROLE: &str = "c_role";
    pub const USERS_EMAIL: &str = "c_email";
    pub const USERS_OPTLOCK: &str = "c_optlock";

    pub const FLIGHTENTRIES_FLIGHT_ID: &str = "c_flight_id";
    pub const FLIGHTENTRIES_USERNAME: &str = "c_username";
    pub const FLIGHTENTRIES_DATE: &str = "c_date";
    pub const FLIGHTENTRIES_AIRCRAFT: &str = "c_aircraft";
    pub const FLIGHTENTRIES_DEPARTURE_TIME: &str = "c_departure_time";
    pub const FLIGHTENTRIES_DEPARTURE_AIRPORT: &str = "c_departure_airport";
    pub const FLIGHTENTRIES_LANDING_TIME: &str = "c_landing_time";
    pub const FLIGHTENTRIES_LANDING_AIRPORT: &str = "c_landing_airport";
    pub const FLIGHTENTRIES_ONBLOCK_TIME: &str = "c_onblock_time";
    pub const FLIGHTENTRIES_OFFBLOCK_TIME: &str = "c_offblock_time";
    pub const FLIGHTENTRIES_FLIGHT_TYPE: &str = "c_flight_type";
    pub const FLIGHTENTRIES_IFR_TIME: &str = "c_ifr_time";
    pub const FLIGHTENTRIES_NOTES: &str = "c_notes";
    pub const FLIGHTENTRIES_OPTLOCK: &str = "c_optlock";

    pub const AIRPORTS_ID: &str = "c_id";
    pub const AIRPORTS_CODE: &str = "c_code";
    pub const AIRPORTS_COUNTRY: &str = "c_country";
    pub const AIRPORTS_CITY: &str = "c_city";
    pub const AIRPORTS_NAME: &str = "c_name";
    pub const AIRPORTS_LOCATION: &str = "c_location";
    pub const AIRPORTS_OPTLOCK: &str = "c_optlock";

    pub const AIRCRAFTS_REGISTER: &str = "c_register";
    pub const AIRCRAFTS_CLASS: &str = "c_class";
    pub const AIRCRAFTS_CAPACITY: &str = "c_capacity";
    pub const AIRCRAFTS_WEIGHT: &str = "c_weight";
    pub const AIRCRAFTS_OPTLOCK: &str = "c_optlock";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaGenerator;

    #[test]
    fn test_flybook_tables() {
        let schema = flybook_schema().unwrap();
        let names: Vec<&str> = schema.tables().iter().map(|t| t.name()).collect();
        assert_eq!(names, ["Users", "FlightEntries", "Airports", "Aircrafts"]);

        let flights = schema.table("FlightEntries").unwrap();
        assert_eq!(flights.primary_key().name(), "flight_id");
        assert_eq!(flights.version_column().name(), "optlock");
        assert!(flights.primary_key().column_type().is_integer());

        let users = schema.table("Users").unwrap();
        assert!(!users.primary_key().column_type().is_integer());
    }

    #[test]
    fn test_constants_module_matches_generated() {
        let schema = flybook_schema().unwrap();
        let generated = SchemaGenerator::for_schema(&schema)
            .render_constants_module(&schema)
            .unwrap();

        let checked_in = include_str!("flybook.rs");
        let start = checked_in
            .find("pub mod constants {")
            .expect("constants module present");
        let body = &checked_in[start..];
        let end = body.find("\n}\n").expect("constants module closed");

        let expected: Vec<&str> = generated
            .lines()
            .filter(|l| l.starts_with("pub const"))
            .collect();
        let actual: Vec<&str> = body[..end]
            .lines()
            .map(str::trim)
            .filter(|l| l.starts_with("pub const"))
            .collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_constants_values() {
        assert_eq!(constants::TABLE_FLIGHTENTRIES, "FlightEntries");
        assert_eq!(constants::FLIGHTENTRIES_OPTLOCK, "c_optlock");
        assert_eq!(constants::COLPREFIX, NamingConfig::default().column_prefix);
    }
}
