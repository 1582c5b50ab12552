use std::{
	collections::{BTreeMap, HashMap, HashSet},
	sync::{
		Mutex, MutexGuard,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::{Duration, Instant},
};

use time::OffsetDateTime;

use compass_domain::Predicate;
use compass_storage::{
	Error, Result,
	cache::CacheStore,
	index::{BoxFuture, BranchHit, CompanyStore, SearchIndex},
	models::{Company, NewCompany},
};

const STOP_WORDS: &[&str] =
	&["a", "an", "and", "at", "by", "for", "in", "is", "of", "on", "the", "to", "with"];

pub fn company_fixture(
	name: &str,
	description: &str,
	industry: &str,
	location: &str,
) -> NewCompany {
	NewCompany {
		name: name.to_string(),
		description: description.to_string(),
		industry: industry.to_string(),
		size: "51-200".to_string(),
		location: location.to_string(),
		tags: Vec::new(),
	}
}

struct StoredCompany {
	company: Company,
	embedding: Option<Vec<f32>>,
}

#[derive(Default)]
struct IndexState {
	next_id: i64,
	rows: BTreeMap<i64, StoredCompany>,
}

/// An in-memory [`CompanyStore`] that also answers both ranking branches.
///
/// The vector branch orders by cosine distance. The lexical branch counts distinct query terms
/// found in `content`, ignoring a handful of English stop words.
#[derive(Default)]
pub struct MemoryIndex {
	state: Mutex<IndexState>,
	calls: AtomicUsize,
	unavailable: AtomicBool,
	indexing_fails: AtomicBool,
}
impl MemoryIndex {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of store and index calls made so far, including failed ones.
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	/// Makes every subsequent call fail with [`Error::Unavailable`].
	pub fn set_unavailable(&self, unavailable: bool) {
		self.unavailable.store(unavailable, Ordering::SeqCst);
	}

	/// Makes only `index_company` fail, leaving the row store working.
	pub fn set_indexing_fails(&self, fails: bool) {
		self.indexing_fails.store(fails, Ordering::SeqCst);
	}

	pub fn len(&self) -> usize {
		self.lock().rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn enter(&self) -> Result<MutexGuard<'_, IndexState>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		if self.unavailable.load(Ordering::SeqCst) {
			return Err(Error::Unavailable("memory index is unavailable".to_string()));
		}

		Ok(self.lock())
	}

	fn lock(&self) -> MutexGuard<'_, IndexState> {
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}

	fn vector_ranks_now(
		&self,
		vector: &[f32],
		predicate: &Predicate,
		limit: u32,
	) -> Result<Vec<BranchHit>> {
		let state = self.enter()?;
		let mut scored = state
			.rows
			.values()
			.filter(|row| predicate.evaluate(&row.company))
			.filter_map(|row| {
				let embedding = row.embedding.as_deref()?;

				Some((row.company.id, cosine_distance(vector, embedding)))
			})
			.collect::<Vec<_>>();

		scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

		Ok(positional_hits(scored.into_iter().map(|(id, _)| id), limit))
	}

	fn lexical_ranks_now(
		&self,
		text: &str,
		predicate: &Predicate,
		limit: u32,
	) -> Result<Vec<BranchHit>> {
		let state = self.enter()?;
		let terms = terms(text);
		let mut scored = state
			.rows
			.values()
			.filter(|row| predicate.evaluate(&row.company))
			.filter_map(|row| {
				let content = terms_of(&row.company.content).into_iter().collect::<HashSet<_>>();
				let matched = terms.iter().filter(|term| content.contains(term.as_str())).count();

				(matched > 0).then_some((row.company.id, matched))
			})
			.collect::<Vec<_>>();

		scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

		Ok(positional_hits(scored.into_iter().map(|(id, _)| id), limit))
	}

	fn insert_now(&self, company: &NewCompany, embedding: Option<&[f32]>) -> Result<Company> {
		let mut state = self.enter()?;

		state.next_id += 1;

		let company = Company {
			id: state.next_id,
			name: company.name.clone(),
			description: company.description.clone(),
			industry: company.industry.clone(),
			size: company.size.clone(),
			location: company.location.clone(),
			tags: company.tags.clone(),
			content: company.render_content(),
			created_at: OffsetDateTime::now_utc(),
		};

		state.rows.insert(
			company.id,
			StoredCompany { company: company.clone(), embedding: embedding.map(<[f32]>::to_vec) },
		);

		Ok(company)
	}
}

impl SearchIndex for MemoryIndex {
	fn vector_ranks<'a>(
		&'a self,
		vector: &'a [f32],
		predicate: &'a Predicate,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<BranchHit>>> {
		Box::pin(async move { self.vector_ranks_now(vector, predicate, limit) })
	}

	fn lexical_ranks<'a>(
		&'a self,
		text: &'a str,
		predicate: &'a Predicate,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<BranchHit>>> {
		Box::pin(async move { self.lexical_ranks_now(text, predicate, limit) })
	}

	fn index_company<'a>(
		&'a self,
		company: &'a Company,
		embedding: Option<&'a [f32]>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut state = self.enter()?;

			if self.indexing_fails.load(Ordering::SeqCst) {
				return Err(Error::Unavailable("memory index rejected the write".to_string()));
			}
			if let Some(row) = state.rows.get_mut(&company.id) {
				row.embedding = embedding.map(<[f32]>::to_vec);
			}

			Ok(())
		})
	}

	fn remove_company<'a>(&'a self, _id: i64) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { self.enter().map(|_| ()) })
	}
}

impl CompanyStore for MemoryIndex {
	fn insert<'a>(
		&'a self,
		company: &'a NewCompany,
		embedding: Option<&'a [f32]>,
	) -> BoxFuture<'a, Result<Company>> {
		Box::pin(async move { self.insert_now(company, embedding) })
	}

	fn delete<'a>(&'a self, id: i64) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(self.enter()?.rows.remove(&id).is_some()) })
	}

	fn list<'a>(&'a self) -> BoxFuture<'a, Result<Vec<Company>>> {
		Box::pin(async move {
			Ok(self.enter()?.rows.values().map(|row| row.company.clone()).collect())
		})
	}

	fn fetch_by_ids<'a>(&'a self, ids: &'a [i64]) -> BoxFuture<'a, Result<Vec<Company>>> {
		Box::pin(async move {
			let state = self.enter()?;
			let wanted = ids.iter().copied().collect::<HashSet<_>>();

			// Descending id order, so callers cannot rely on the store preserving rank order.
			Ok(state
				.rows
				.values()
				.rev()
				.filter(|row| wanted.contains(&row.company.id))
				.map(|row| row.company.clone())
				.collect())
		})
	}
}

struct CacheEntry {
	value: String,
	expires_at: Instant,
}

/// An in-memory [`CacheStore`] with TTL expiry and Redis-style `*` / `?` glob deletes.
#[derive(Default)]
pub struct MemoryCache {
	entries: Mutex<HashMap<String, CacheEntry>>,
	unavailable: AtomicBool,
	latency: Mutex<Duration>,
	scan_latency: Mutex<Duration>,
	gets: AtomicUsize,
	sets: AtomicUsize,
}
impl MemoryCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes every subsequent call fail with [`Error::Unavailable`].
	pub fn set_unavailable(&self, unavailable: bool) {
		self.unavailable.store(unavailable, Ordering::SeqCst);
	}

	/// Delays every call by `latency` before it touches the entries.
	pub fn set_latency(&self, latency: Duration) {
		*self.latency.lock().unwrap_or_else(|err| err.into_inner()) = latency;
	}

	/// Delays only `scan_delete`, on top of `set_latency`.
	pub fn set_scan_latency(&self, latency: Duration) {
		*self.scan_latency.lock().unwrap_or_else(|err| err.into_inner()) = latency;
	}

	pub fn gets(&self) -> usize {
		self.gets.load(Ordering::SeqCst)
	}

	pub fn sets(&self) -> usize {
		self.sets.load(Ordering::SeqCst)
	}

	pub fn contains(&self, key: &str) -> bool {
		self.live_entries().contains_key(key)
	}

	pub fn keys(&self) -> Vec<String> {
		let mut keys = self.live_entries().keys().cloned().collect::<Vec<_>>();

		keys.sort();

		keys
	}

	fn live_entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
		let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
		let now = Instant::now();

		entries.retain(|_, entry| entry.expires_at > now);

		entries
	}

	async fn enter(&self) -> Result<MutexGuard<'_, HashMap<String, CacheEntry>>> {
		let latency = *self.latency.lock().unwrap_or_else(|err| err.into_inner());

		if !latency.is_zero() {
			tokio::time::sleep(latency).await;
		}
		if self.unavailable.load(Ordering::SeqCst) {
			return Err(Error::Unavailable("memory cache is unavailable".to_string()));
		}

		Ok(self.live_entries())
	}
}

impl CacheStore for MemoryCache {
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
		Box::pin(async move {
			self.gets.fetch_add(1, Ordering::SeqCst);

			Ok(self.enter().await?.get(key).map(|entry| entry.value.clone()))
		})
	}

	fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl_secs: u64) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.sets.fetch_add(1, Ordering::SeqCst);

			let entry = CacheEntry {
				value: value.to_string(),
				expires_at: Instant::now() + Duration::from_secs(ttl_secs),
			};

			self.enter().await?.insert(key.to_string(), entry);

			Ok(())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.enter().await?.remove(key);

			Ok(())
		})
	}

	fn scan_delete<'a>(&'a self, pattern: &'a str) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move {
			let scan_latency = *self.scan_latency.lock().unwrap_or_else(|err| err.into_inner());

			if !scan_latency.is_zero() {
				tokio::time::sleep(scan_latency).await;
			}

			let mut entries = self.enter().await?;
			let before = entries.len();

			entries.retain(|key, _| !glob_matches(pattern.as_bytes(), key.as_bytes()));

			Ok((before - entries.len()) as u64)
		})
	}
}

fn positional_hits(ids: impl Iterator<Item = i64>, limit: u32) -> Vec<BranchHit> {
	ids.take(limit as usize)
		.enumerate()
		.map(|(idx, id)| BranchHit { id, rank: idx as u32 + 1 })
		.collect()
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
	let dot = a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
	let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
	let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

	if norm_a == 0.0 || norm_b == 0.0 {
		return 1.0;
	}

	1.0 - dot / (norm_a * norm_b)
}

fn terms(text: &str) -> Vec<String> {
	let mut seen = HashSet::new();

	terms_of(text).into_iter().filter(|term| seen.insert(term.clone())).collect()
}

fn terms_of(text: &str) -> Vec<String> {
	text.split(|ch: char| !ch.is_alphanumeric())
		.filter(|word| !word.is_empty())
		.map(str::to_lowercase)
		.filter(|word| !STOP_WORDS.contains(&word.as_str()))
		.collect()
}

fn glob_matches(pattern: &[u8], text: &[u8]) -> bool {
	match (pattern.first(), text.first()) {
		(None, None) => true,
		(Some(b'*'), _) =>
			glob_matches(&pattern[1..], text)
				|| (!text.is_empty() && glob_matches(pattern, &text[1..])),
		(Some(b'?'), Some(_)) => glob_matches(&pattern[1..], &text[1..]),
		(Some(p), Some(t)) if p == t => glob_matches(&pattern[1..], &text[1..]),
		_ => false,
	}
}
