use super::super::types::{ChangeEvent, ChangeKind};
use super::super::ChangeSubscription;
use super::{parse_body, query_failure, rest_client, DatabaseError, SupabaseStore};
use postgrest::Postgrest;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::{info, warn};

const CHANGE_BUFFER: usize = 100;

type Snapshot = BTreeMap<i64, Value>;

impl SupabaseStore {
    /// Polls `table` and reports row inserts, updates and deletes. The first
    /// poll only records a baseline.
    pub fn watch_table(&self, table: &str) -> ChangeSubscription {
        let (sender, receiver) = mpsc::channel::<ChangeEvent>(CHANGE_BUFFER);
        let client = rest_client(&self.base_url, &self.service_key);
        let table = table.to_string();
        let poll_interval = self.settings.poll_interval;

        let task = tokio::spawn(async move {
            info!(table = %table, "Watching table for changes");
            let mut ticker = tokio::time::interval(poll_interval);
            let mut previous: Option<Snapshot> = None;

            loop {
                ticker.tick().await;
                let current = match fetch_snapshot(&client, &table).await {
                    Ok(current) => current,
                    Err(e) => {
                        warn!(table = %table, error = %e, "Change poll failed");
                        continue;
                    }
                };

                if let Some(previous) = &previous {
                    for event in diff_snapshots(&table, previous, &current) {
                        if sender.send(event).await.is_err() {
                            info!(table = %table, "Change subscriber gone");
                            return;
                        }
                    }
                }
                previous = Some(current);
            }
        });

        ChangeSubscription::new(receiver, Some(task))
    }
}

async fn fetch_snapshot(client: &Postgrest, table: &str) -> Result<Snapshot, DatabaseError> {
    let response = client
        .from(table)
        .select("*")
        .execute()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(query_failure(status.as_u16(), &body));
    }

    let body = response
        .text()
        .await
        .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

    let rows: Vec<Value> = parse_body(&body)?;

    Ok(rows
        .into_iter()
        .filter_map(|row| row.get("id").and_then(Value::as_i64).map(|id| (id, row)))
        .collect())
}

fn diff_snapshots(table: &str, previous: &Snapshot, current: &Snapshot) -> Vec<ChangeEvent> {
    let event = |kind, id: i64| ChangeEvent {
        table: table.to_string(),
        kind,
        record_id: Some(id),
    };

    let mut events = Vec::new();
    for (id, row) in current {
        match previous.get(id) {
            None => events.push(event(ChangeKind::Insert, *id)),
            Some(old) if old != row => events.push(event(ChangeKind::Update, *id)),
            Some(_) => {}
        }
    }
    for id in previous.keys() {
        if !current.contains_key(id) {
            events.push(event(ChangeKind::Delete, *id));
        }
    }
    events
}
