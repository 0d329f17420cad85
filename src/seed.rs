//! Deterministic sample data for a fresh logbook.
//!
//! Generation is pure: the same RNG state always yields the same
//! [`SampleData`]. Writing goes through [`TableContainer`]s, one commit per
//! table.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::container::{ContainerError, ContainerResult, RowId, TableContainer, VersionStrategy};
use crate::database::{DatabaseConnection, DatabaseValue};
use crate::schema::Schema;

const FIRST_NAMES: &[&str] = &["Andre", "Konstantin", "John", "Stephen", "Neil", "Michio"];
const LAST_NAMES: &[&str] = &["Konstantin", "Novoselov", "Venter", "Hawking", "Tyson", "Kaku"];

// code, country, city, name, location
const AIRPORTS: &[(&str, &str, &str, &str, &str)] = &[
    ("EFHK", "Finland", "Helsinki", "Helsinki-Vantaa", "60.3172:24.9633"),
    ("EFTP", "Finland", "Tampere", "Tampere-Pirkkala", "61.4141:23.6044"),
    ("EFTU", "Finland", "Turku", "Turku", "60.5141:22.2628"),
    ("EFOU", "Finland", "Oulu", "Oulu", "64.9301:25.3546"),
    ("EFRO", "Finland", "Rovaniemi", "Rovaniemi", "66.5648:25.8304"),
    ("EFJY", "Finland", "Jyvaskyla", "Jyvaskyla", "62.3995:25.6783"),
    ("ESSA", "Sweden", "Stockholm", "Stockholm-Arlanda", "59.6519:17.9186"),
    ("ENGM", "Norway", "Oslo", "Oslo-Gardermoen", "60.1939:11.1004"),
    ("EKCH", "Denmark", "Copenhagen", "Copenhagen-Kastrup", "55.6180:12.6560"),
    ("EETN", "Estonia", "Tallinn", "Tallinn", "59.4133:24.8328"),
];

/// Knobs for the generated data set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedOptions {
    #[serde(default = "default_flights_per_user")]
    pub flights_per_user: usize,
    #[serde(default = "default_aircraft_count")]
    pub aircraft_count: usize,
    /// First day flights may be logged on
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,
}

fn default_flights_per_user() -> usize {
    2
}
fn default_aircraft_count() -> usize {
    3
}
fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2012, 1, 1).unwrap_or_default()
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            flights_per_user: default_flights_per_user(),
            aircraft_count: default_aircraft_count(),
            start_date: default_start_date(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub role: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AirportRecord {
    pub code: String,
    pub country: String,
    pub city: String,
    pub name: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AircraftRecord {
    pub register: String,
    pub class: i64,
    pub capacity: i64,
    pub weight: i64,
}

/// A flight; airports are positions in [`SampleData::airports`]. Times are
/// unix seconds, `ifr_time` is minutes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightRecord {
    pub username: String,
    pub aircraft: String,
    pub date: i64,
    pub departure_time: i64,
    pub departure_airport: usize,
    pub landing_time: i64,
    pub landing_airport: usize,
    pub offblock_time: i64,
    pub onblock_time: i64,
    pub flight_type: i64,
    pub ifr_time: i64,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SampleData {
    pub users: Vec<UserRecord>,
    pub airports: Vec<AirportRecord>,
    pub aircraft: Vec<AircraftRecord>,
    pub flights: Vec<FlightRecord>,
}

/// Rows written by [`populate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedSummary {
    pub users: usize,
    pub airports: usize,
    pub aircraft: usize,
    pub flights: usize,
}

/// Produces [`SampleData`] from an explicit random source.
pub struct SampleDataGenerator<R: Rng> {
    rng: R,
    options: SeedOptions,
}

impl SampleDataGenerator<StdRng> {
    /// Generator over a seeded [`StdRng`].
    pub fn from_seed(seed: u64, options: SeedOptions) -> Self {
        Self::new(StdRng::seed_from_u64(seed), options)
    }
}

impl<R: Rng> SampleDataGenerator<R> {
    pub fn new(rng: R, options: SeedOptions) -> Self {
        Self { rng, options }
    }

    pub fn generate(&mut self) -> SampleData {
        let users = self.users();
        let airports = self.airports();
        let aircraft = self.aircraft();
        let flights = self.flights(&users, airports.len(), &aircraft);
        SampleData {
            users,
            airports,
            aircraft,
            flights,
        }
    }

    fn users(&mut self) -> Vec<UserRecord> {
        let mut users = Vec::with_capacity(FIRST_NAMES.len() * LAST_NAMES.len());
        for first in FIRST_NAMES {
            for last in LAST_NAMES {
                let username = format!("{}{}", &first[..3], &last[..3]).to_lowercase();
                users.push(UserRecord {
                    username,
                    firstname: first.to_string(),
                    lastname: last.to_string(),
                    email: format!("{}.{}@mail.com", first, last),
                    role: 0,
                });
            }
        }
        users
    }

    fn airports(&mut self) -> Vec<AirportRecord> {
        AIRPORTS
            .iter()
            .map(|(code, country, city, name, location)| AirportRecord {
                code: code.to_string(),
                country: country.to_string(),
                city: city.to_string(),
                name: name.to_string(),
                location: location.to_string(),
            })
            .collect()
    }

    fn aircraft(&mut self) -> Vec<AircraftRecord> {
        let mut registers = HashSet::new();
        let mut aircraft = Vec::with_capacity(self.options.aircraft_count);
        // 26^3 registers exist; stop short of looping forever on absurd counts.
        let count = self.options.aircraft_count.min(26 * 26 * 26);
        while aircraft.len() < count {
            let suffix: String = (0..3)
                .map(|_| char::from(b'A' + self.rng.random_range(0..26u8)))
                .collect();
            let register = format!("OH-{}", suffix);
            if !registers.insert(register.clone()) {
                continue;
            }
            aircraft.push(AircraftRecord {
                register,
                class: self.rng.random_range(0..4),
                capacity: [2, 4, 6][self.rng.random_range(0..3usize)],
                weight: self.rng.random_range(600..2000),
            });
        }
        aircraft
    }

    fn flights(
        &mut self,
        users: &[UserRecord],
        airport_count: usize,
        aircraft: &[AircraftRecord],
    ) -> Vec<FlightRecord> {
        if aircraft.is_empty() || airport_count == 0 {
            return Vec::new();
        }

        let mut flights = Vec::with_capacity(users.len() * self.options.flights_per_user);
        for user in users {
            for _ in 0..self.options.flights_per_user {
                let day = self.options.start_date + Days::new(self.rng.random_range(0..365));
                let departure: NaiveDateTime = day.and_time(NaiveTime::MIN)
                    + TimeDelta::minutes(self.rng.random_range(6 * 60..20 * 60));
                let taxi = TimeDelta::minutes(10 + self.rng.random_range(0..20));
                let landing = departure + TimeDelta::minutes(15 + self.rng.random_range(0..500));

                let departure_airport = self.rng.random_range(0..airport_count);
                let mut landing_airport = departure_airport;
                while airport_count > 1 && landing_airport == departure_airport {
                    landing_airport = self.rng.random_range(0..airport_count);
                }

                flights.push(FlightRecord {
                    username: user.username.clone(),
                    aircraft: aircraft[self.rng.random_range(0..aircraft.len())]
                        .register
                        .clone(),
                    date: day.and_time(NaiveTime::MIN).and_utc().timestamp(),
                    departure_time: departure.and_utc().timestamp(),
                    departure_airport,
                    landing_time: landing.and_utc().timestamp(),
                    landing_airport,
                    offblock_time: (departure - taxi).and_utc().timestamp(),
                    onblock_time: (landing + taxi).and_utc().timestamp(),
                    flight_type: self.rng.random_range(0..3),
                    ifr_time: self.rng.random_range(0..60),
                    notes: String::new(),
                });
            }
        }
        flights
    }
}

/// Write `data` into the tables of `schema`, committing one table at a time.
pub async fn populate(
    connection: Arc<dyn DatabaseConnection>,
    schema: &Schema,
    data: &SampleData,
    strategy: VersionStrategy,
) -> ContainerResult<SeedSummary> {
    let naming = schema.naming().clone();
    let col = |name: &str| naming.column_name(name);
    let mut summary = SeedSummary::default();

    let mut users = TableContainer::for_table(connection.clone(), schema, "Users", strategy).await?;
    for user in &data.users {
        let id = users.add_row();
        users.set_text(&id, &col("username"), &user.username)?;
        users.set_text(&id, &col("firstname"), &user.firstname)?;
        users.set_text(&id, &col("lastname"), &user.lastname)?;
        users.set_text(&id, &col("email"), &user.email)?;
        users.set_integer(&id, &col("role"), user.role)?;
    }
    summary.users = users.commit().await?.inserted.len();

    let mut airports =
        TableContainer::for_table(connection.clone(), schema, "Airports", strategy).await?;
    let mut airport_rows = Vec::with_capacity(data.airports.len());
    for airport in &data.airports {
        let id = airports.add_row();
        airports.set_text(&id, &col("code"), &airport.code)?;
        airports.set_text(&id, &col("country"), &airport.country)?;
        airports.set_text(&id, &col("city"), &airport.city)?;
        airports.set_text(&id, &col("name"), &airport.name)?;
        airports.set_text(&id, &col("location"), &airport.location)?;
        airport_rows.push(id);
    }
    let outcome = airports.commit().await?;
    summary.airports = outcome.inserted.len();
    let airport_keys = airport_rows
        .iter()
        .map(|temp| match outcome.resolve(temp) {
            Some(RowId::Persistent(key)) => Ok(key.to_value()),
            _ => Err(ContainerError::UnknownRow(temp.clone())),
        })
        .collect::<ContainerResult<Vec<DatabaseValue>>>()?;

    let mut aircraft =
        TableContainer::for_table(connection.clone(), schema, "Aircrafts", strategy).await?;
    for record in &data.aircraft {
        let id = aircraft.add_row();
        aircraft.set_text(&id, &col("register"), &record.register)?;
        aircraft.set_integer(&id, &col("class"), record.class)?;
        aircraft.set_integer(&id, &col("capacity"), record.capacity)?;
        aircraft.set_integer(&id, &col("weight"), record.weight)?;
    }
    summary.aircraft = aircraft.commit().await?.inserted.len();

    let mut flights =
        TableContainer::for_table(connection, schema, "FlightEntries", strategy).await?;
    for flight in &data.flights {
        let id = flights.add_row();
        flights.set_text(&id, &col("username"), &flight.username)?;
        flights.set_text(&id, &col("aircraft"), &flight.aircraft)?;
        flights.set_integer(&id, &col("date"), flight.date)?;
        flights.set_integer(&id, &col("departure_time"), flight.departure_time)?;
        flights.set_integer(&id, &col("landing_time"), flight.landing_time)?;
        flights.set_integer(&id, &col("offblock_time"), flight.offblock_time)?;
        flights.set_integer(&id, &col("onblock_time"), flight.onblock_time)?;
        flights.set_integer(&id, &col("flight_type"), flight.flight_type)?;
        flights.set_integer(&id, &col("ifr_time"), flight.ifr_time)?;
        flights.set_text(&id, &col("notes"), &flight.notes)?;
        for (column, index) in [
            ("departure_airport", flight.departure_airport),
            ("landing_airport", flight.landing_airport),
        ] {
            let key = airport_keys
                .get(index)
                .cloned()
                .unwrap_or(DatabaseValue::Null);
            flights.set_column(&id, &col(column), key)?;
        }
    }
    summary.flights = flights.commit().await?.inserted.len();

    tracing::info!(
        users = summary.users,
        airports = summary.airports,
        aircraft = summary.aircraft,
        flights = summary.flights,
        "sample data written"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{create_database_connection, extensions};
    use crate::schema::{SchemaManager, flybook_schema};

    #[test]
    fn test_same_seed_same_data() {
        let first = SampleDataGenerator::from_seed(7, SeedOptions::default()).generate();
        let second = SampleDataGenerator::from_seed(7, SeedOptions::default()).generate();
        assert_eq!(first, second);

        let other = SampleDataGenerator::from_seed(8, SeedOptions::default()).generate();
        assert_ne!(first.flights, other.flights);
    }

    #[test]
    fn test_generated_shape() {
        let data = SampleDataGenerator::from_seed(1, SeedOptions::default()).generate();
        assert_eq!(data.users.len(), 36);
        assert_eq!(data.users[0].username, "andkon");
        assert_eq!(data.aircraft.len(), 3);
        assert_eq!(data.flights.len(), 72);

        for aircraft in &data.aircraft {
            assert!(aircraft.register.starts_with("OH-"));
            assert_eq!(aircraft.register.len(), 6);
        }
        for flight in &data.flights {
            assert_ne!(flight.departure_airport, flight.landing_airport);
            assert!(flight.landing_time > flight.departure_time);
            assert!(flight.date <= flight.departure_time);
            assert!(flight.departure_time - flight.date < 24 * 3600);
            assert!(flight.onblock_time > flight.offblock_time);
            assert!(data.aircraft.iter().any(|a| a.register == flight.aircraft));
        }
    }

    #[test]
    fn test_options_from_toml() {
        let options: SeedOptions = toml::from_str("flights_per_user = 5").unwrap();
        assert_eq!(options.flights_per_user, 5);
        assert_eq!(options.aircraft_count, 3);
        assert_eq!(options.start_date, NaiveDate::from_ymd_opt(2012, 1, 1).unwrap());
    }

    #[tokio::test]
    async fn test_populate_flybook() {
        let db: Arc<dyn DatabaseConnection> =
            Arc::from(create_database_connection(&extensions::in_memory_config()).await.unwrap());
        let schema = flybook_schema().unwrap();
        db.install_schema(&schema, true).await.unwrap();

        let options = SeedOptions {
            flights_per_user: 1,
            ..SeedOptions::default()
        };
        let data = SampleDataGenerator::from_seed(42, options).generate();
        let summary = populate(db.clone(), &schema, &data, VersionStrategy::Trigger)
            .await
            .unwrap();

        assert_eq!(
            summary,
            SeedSummary {
                users: 36,
                airports: AIRPORTS.len(),
                aircraft: 3,
                flights: 36,
            }
        );

        let row = db
            .query_one(
                "SELECT COUNT(*) AS n FROM FlightEntries f \
                 JOIN Airports a ON a.c_id = f.c_departure_airport \
                 WHERE f.c_optlock = 0",
                &[],
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.get_i64("n").unwrap(), 36);

        let row = db
            .query_one(
                "SELECT COUNT(*) AS n FROM FlightEntries \
                 WHERE typeof(c_departure_time) = 'integer' \
                 AND c_landing_time > c_departure_time",
                &[],
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.get_i64("n").unwrap(), 36);
    }
}
