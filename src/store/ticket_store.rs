use crate::domain::{
    operation_key, store_key, store_prefix, Movie, Order, Showtime, StaffOperation, Stores, Theater,
};
use crate::store::{StateStoreBackend, StoreBatch};
use crate::Result;
use chrono::NaiveDate;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Read-side lookups for the catalogue a box office sells from.
pub trait ShowtimeDirectory: Send + Sync {
    fn get_movie(&self, movie_id: &str) -> Result<Option<Movie>>;
    fn list_movies(&self) -> Result<Vec<Movie>>;
    fn get_theater(&self, theater_id: &str) -> Result<Option<Theater>>;
    fn get_showtime(&self, showtime_id: &str) -> Result<Option<Showtime>>;
    fn list_showtimes(&self) -> Result<Vec<Showtime>>;

    fn list_showtimes_by_movie(&self, movie_id: &str) -> Result<Vec<Showtime>> {
        Ok(self
            .list_showtimes()?
            .into_iter()
            .filter(|s| s.movie_id == movie_id)
            .collect())
    }

    fn list_showtimes_by_date(&self, date: NaiveDate) -> Result<Vec<Showtime>> {
        Ok(self
            .list_showtimes()?
            .into_iter()
            .filter(|s| s.date() == date)
            .collect())
    }
}

/// Typed access to movies, theaters, showtimes, orders and the operation log.
///
/// Writers that touch a showtime's seats or any of its orders must hold
/// [`TicketStore::lock_showtime`] for the whole read-check-commit sequence.
#[derive(Clone)]
pub struct TicketStore {
    backend: Arc<StateStoreBackend>,
    showtime_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl TicketStore {
    pub fn new(backend: StateStoreBackend) -> Self {
        Self {
            backend: Arc::new(backend),
            showtime_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(StateStoreBackend::new_in_memory())
    }

    pub fn backend(&self) -> Arc<StateStoreBackend> {
        Arc::clone(&self.backend)
    }

    pub async fn lock_showtime(&self, showtime_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .showtime_locks
            .entry(showtime_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    pub fn put_movie(&self, movie: &Movie) -> Result<()> {
        self.backend
            .put(&store_key(Stores::MOVIE, &movie.movie_id), movie)
    }

    pub fn put_theater(&self, theater: &Theater) -> Result<()> {
        self.backend
            .put(&store_key(Stores::THEATER, &theater.theater_id), theater)
    }

    pub fn put_showtime(&self, showtime: &Showtime) -> Result<()> {
        self.backend
            .put(&store_key(Stores::SHOWTIME, &showtime.showtime_id), showtime)
    }

    pub fn get_order(&self, order_id: &str) -> Result<Option<Order>> {
        self.backend.get(&store_key(Stores::ORDER, order_id))
    }

    pub fn put_order(&self, order: &Order) -> Result<()> {
        self.backend.put(&store_key(Stores::ORDER, &order.order_id), order)
    }

    pub fn list_orders(&self) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self.backend.scan_prefix(&store_prefix(Stores::ORDER))?;
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }

    pub fn list_operations(&self) -> Result<Vec<StaffOperation>> {
        self.backend.scan_prefix(&store_prefix(Stores::OPERATION))
    }

    pub fn batch_order(&self, batch: &mut StoreBatch, order: &Order) -> Result<()> {
        batch.put(store_key(Stores::ORDER, &order.order_id), order)
    }

    pub fn batch_showtime(&self, batch: &mut StoreBatch, showtime: &Showtime) -> Result<()> {
        batch.put(store_key(Stores::SHOWTIME, &showtime.showtime_id), showtime)
    }

    pub fn batch_operation(&self, batch: &mut StoreBatch, operation: &StaffOperation) -> Result<()> {
        batch.put(
            operation_key(operation.created_at.timestamp_millis(), &operation.operation_id),
            operation,
        )
    }

    pub fn commit(&self, batch: StoreBatch) -> Result<()> {
        self.backend.commit(batch)
    }

    pub fn flush(&self) -> Result<()> {
        self.backend.flush()
    }
}

impl ShowtimeDirectory for TicketStore {
    fn get_movie(&self, movie_id: &str) -> Result<Option<Movie>> {
        self.backend.get(&store_key(Stores::MOVIE, movie_id))
    }

    fn list_movies(&self) -> Result<Vec<Movie>> {
        self.backend.scan_prefix(&store_prefix(Stores::MOVIE))
    }

    fn get_theater(&self, theater_id: &str) -> Result<Option<Theater>> {
        self.backend.get(&store_key(Stores::THEATER, theater_id))
    }

    fn get_showtime(&self, showtime_id: &str) -> Result<Option<Showtime>> {
        self.backend.get(&store_key(Stores::SHOWTIME, showtime_id))
    }

    fn list_showtimes(&self) -> Result<Vec<Showtime>> {
        let mut showtimes: Vec<Showtime> =
            self.backend.scan_prefix(&store_prefix(Stores::SHOWTIME))?;
        showtimes.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        Ok(showtimes)
    }
}
