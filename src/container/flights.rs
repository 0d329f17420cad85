//! Flight log view over the `FlightEntries` table.

use chrono::NaiveDateTime;
use std::sync::Arc;

use crate::container::{CommitOutcome, ContainerResult, Filter, RowId, TableContainer, VersionStrategy};
use crate::database::DatabaseConnection;
use crate::schema::Schema;

pub const FLIGHTS_TABLE: &str = "FlightEntries";

/// A [`TableContainer`] over the flight log with replaceable user, time and
/// flight type filters.
pub struct FlightsContainer {
    inner: TableContainer,
    user: Option<String>,
    time_range: Option<(i64, i64)>,
    flight_type: Option<i64>,
}

impl FlightsContainer {
    pub async fn load(
        connection: Arc<dyn DatabaseConnection>,
        schema: &Schema,
        strategy: VersionStrategy,
    ) -> ContainerResult<Self> {
        let inner = TableContainer::for_table(connection, schema, FLIGHTS_TABLE, strategy).await?;
        Ok(Self {
            inner,
            user: None,
            time_range: None,
            flight_type: None,
        })
    }

    pub fn container(&self) -> &TableContainer {
        &self.inner
    }

    pub fn container_mut(&mut self) -> &mut TableContainer {
        &mut self.inner
    }

    fn column(&self, name: &str) -> String {
        self.inner.naming().column_name(name)
    }

    /// Show only flights of `username`; `None` drops the filter.
    pub fn filter_by_user(&mut self, username: Option<&str>) -> ContainerResult<()> {
        self.user = username.map(str::to_string);
        self.apply_filters()
    }

    /// Show only flights in the air during `[from, to]` (unix seconds): they
    /// depart no later than `to` and land no earlier than `from`. `None`
    /// drops the filter. An inverted range is swapped.
    pub fn filter_by_time(&mut self, range: Option<(i64, i64)>) -> ContainerResult<()> {
        self.time_range = range.map(|(from, to)| if from <= to { (from, to) } else { (to, from) });
        self.apply_filters()
    }

    /// Show only flights of one type; `None` drops the filter.
    pub fn filter_by_flight_type(&mut self, flight_type: Option<i64>) -> ContainerResult<()> {
        self.flight_type = flight_type;
        self.apply_filters()
    }

    fn apply_filters(&mut self) -> ContainerResult<()> {
        let mut filters = Vec::new();
        if let Some(user) = &self.user {
            filters.push(Filter::equal(self.column("username"), user.as_str()));
        }
        if let Some((from, to)) = self.time_range {
            filters.push(Filter::and([
                Filter::less_or_equal(self.column("departure_time"), to),
                Filter::greater_or_equal(self.column("landing_time"), from),
            ]));
        }
        if let Some(flight_type) = self.flight_type {
            filters.push(Filter::equal(self.column("flight_type"), flight_type));
        }

        self.inner.clear_filters();
        for filter in filters {
            self.inner.apply_filter(filter)?;
        }
        Ok(())
    }

    /// Stage a new flight for `username`. Date, departure and landing are set
    /// to `now` in unix seconds; block times and IFR time start at zero.
    ///
    /// The flight id is left unset and assigned by storage on commit.
    pub fn add_entry(&mut self, username: &str, now: NaiveDateTime) -> ContainerResult<RowId> {
        let naming = self.inner.naming().clone();
        let col = |name: &str| naming.column_name(name);
        let id = self.inner.add_row();
        let seconds = now.and_utc().timestamp();

        self.inner.set_text(&id, &col("username"), username)?;
        for column in ["date", "departure_time", "landing_time"] {
            self.inner.set_integer(&id, &col(column), seconds)?;
        }
        for column in ["offblock_time", "onblock_time", "flight_type", "ifr_time"] {
            self.inner.set_integer(&id, &col(column), 0)?;
        }
        self.inner.set_text(&id, &col("notes"), "")?;
        Ok(id)
    }

    pub fn remove_entry(&mut self, id: &RowId) -> bool {
        self.inner.remove_row(id)
    }

    /// Whether a flight exists, filters ignored.
    pub fn contains_flight(&self, id: &RowId) -> bool {
        self.inner.contains_row_unfiltered(id)
    }

    pub async fn commit(&mut self) -> ContainerResult<CommitOutcome> {
        self.inner.commit().await
    }

    pub fn rollback(&mut self) {
        self.inner.rollback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{create_database_connection, extensions, SqlLiteral};
    use crate::schema::{flybook_schema, SchemaManager};
    use crate::seed::{populate, SampleDataGenerator, SeedOptions};
    use chrono::NaiveDate;

    async fn seeded() -> (Arc<dyn DatabaseConnection>, Schema) {
        let db: Arc<dyn DatabaseConnection> =
            Arc::from(create_database_connection(&extensions::in_memory_config()).await.unwrap());
        let schema = flybook_schema().unwrap();
        db.install_schema(&schema, true).await.unwrap();
        let data = SampleDataGenerator::from_seed(3, SeedOptions::default()).generate();
        populate(db.clone(), &schema, &data, VersionStrategy::Trigger)
            .await
            .unwrap();
        (db, schema)
    }

    #[tokio::test]
    async fn test_filters_replace_each_other() {
        let (db, schema) = seeded().await;
        let mut flights = FlightsContainer::load(db, &schema, VersionStrategy::Trigger)
            .await
            .unwrap();
        let total = flights.container().size();
        assert_eq!(total, 72);

        flights.filter_by_user(Some("andkon")).unwrap();
        assert_eq!(flights.container().size(), 2);
        flights.filter_by_user(Some("mictyson")).unwrap();
        assert_eq!(flights.container().size(), 0);
        flights.filter_by_user(Some("mictys")).unwrap();
        assert_eq!(flights.container().size(), 2);
        assert_eq!(flights.container().filters().len(), 1);

        flights.filter_by_user(None).unwrap();
        assert_eq!(flights.container().size(), total);
    }

    #[tokio::test]
    async fn test_time_filter_matches_overlapping_flights() {
        let (db, schema) = seeded().await;
        let mut flights = FlightsContainer::load(db, &schema, VersionStrategy::Trigger)
            .await
            .unwrap();
        let departure = flights.column("departure_time");
        let landing = flights.column("landing_time");

        let first = flights.container().row_ids()[0].clone();
        let start = flights
            .container()
            .get_column_value(&first, &departure)
            .unwrap()
            .and_then(SqlLiteral::as_i64)
            .unwrap();
        let end = flights
            .container()
            .get_column_value(&first, &landing)
            .unwrap()
            .and_then(SqlLiteral::as_i64)
            .unwrap();

        flights.filter_by_time(Some((end, start))).unwrap();
        assert!(flights.container().contains_row(&first));

        // A window touching only the landing instant still matches.
        flights.filter_by_time(Some((end, end + 60))).unwrap();
        assert!(flights.container().contains_row(&first));

        flights.filter_by_time(Some((end + 1, end + 60))).unwrap();
        assert!(!flights.container().contains_row(&first));
        flights.filter_by_time(Some((start - 60, start - 1))).unwrap();
        assert!(!flights.container().contains_row(&first));
        assert!(flights.contains_flight(&first));

        flights.filter_by_time(None).unwrap();
        assert!(flights.container().contains_row(&first));
    }

    #[tokio::test]
    async fn test_add_entry_gets_storage_id() {
        let (db, schema) = seeded().await;
        let mut flights = FlightsContainer::load(db.clone(), &schema, VersionStrategy::Trigger)
            .await
            .unwrap();
        flights.filter_by_flight_type(Some(2)).unwrap();

        let now = NaiveDate::from_ymd_opt(2013, 3, 4)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        let temp = flights.add_entry("andkon", now).unwrap();
        // Type 0 is filtered out but still reachable.
        assert!(!flights.container().contains_row(&temp));
        assert!(flights.contains_flight(&temp));

        let outcome = flights.commit().await.unwrap();
        let stored = outcome.resolve(&temp).unwrap();
        assert_eq!(stored.key().and_then(SqlLiteral::as_i64), Some(73));
        let value = |column: &str| {
            flights
                .container()
                .get_column_value(&stored, &flights.column(column))
                .unwrap()
                .and_then(SqlLiteral::as_i64)
        };
        assert_eq!(value("departure_time"), Some(1_362_400_200));
        assert_eq!(value("landing_time"), Some(1_362_400_200));
        assert_eq!(value("date"), Some(1_362_400_200));
        assert_eq!(value("onblock_time"), Some(0));
        assert_eq!(value("offblock_time"), Some(0));

        assert!(flights.remove_entry(&stored));
        flights.rollback();
        assert!(flights.contains_flight(&stored));
    }
}
