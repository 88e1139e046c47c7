//! Shared fixtures for pipeline integration tests
//!
//! `ScriptedRegistry` answers lookups from a fixed script and records every
//! call plus the peak number of concurrent lookups.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use registry_enrich::store::StoredRecord;
use registry_enrich::{LookupResult, MemoryStore, RegistryClient, TransportError};

pub enum Scripted {
    Found(LookupResult),
    Timeout,
    Panic,
}

#[derive(Default)]
pub struct ScriptedRegistry {
    responses: HashMap<String, Scripted>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    delay: Duration,
}

impl ScriptedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn found(mut self, number: &str, codes: &[&str], status: &str) -> Self {
        self.responses.insert(
            number.to_string(),
            Scripted::Found(LookupResult {
                status_code: 200,
                domain_codes: codes.iter().map(|c| c.to_string()).collect(),
                company_status: status.to_string(),
            }),
        );
        self
    }

    pub fn status(mut self, number: &str, status_code: u16) -> Self {
        self.responses.insert(
            number.to_string(),
            Scripted::Found(LookupResult::no_data(status_code)),
        );
        self
    }

    pub fn timeout(mut self, number: &str) -> Self {
        self.responses.insert(number.to_string(), Scripted::Timeout);
        self
    }

    pub fn panic(mut self, number: &str) -> Self {
        self.responses.insert(number.to_string(), Scripted::Panic);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryClient for ScriptedRegistry {
    async fn lookup(&self, company_number: &str) -> Result<LookupResult, TransportError> {
        self.calls.lock().unwrap().push(company_number.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.responses.get(company_number) {
            Some(Scripted::Found(result)) => Ok(result.clone()),
            Some(Scripted::Timeout) => Err(TransportError::Timeout {
                url: format!("https://registry.test/company/{company_number}"),
            }),
            Some(Scripted::Panic) => panic!("registry fixture panic for {company_number}"),
            None => Ok(LookupResult::no_data(404)),
        }
    }
}

/// Store with a small SIC vocabulary and no records
pub fn store_with_codes() -> MemoryStore {
    let store = MemoryStore::new();
    store.add_code("620", "Information technology service activities");
    store.add_code("4791", "Retail sale via mail order houses or via Internet");
    store.add_code("7010", "Activities of head offices");
    store.add_code("6201", "Computer programming activities");
    store
}

/// Record modified `minutes_ago` minutes before a fixed reference time
pub fn record(id: &str, registry_id: &str, minutes_ago: i64) -> StoredRecord {
    let reference = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let mut r = StoredRecord::new(id, registry_id);
    r.last_modified = reference - ChronoDuration::minutes(minutes_ago);
    r
}
