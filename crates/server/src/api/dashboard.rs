//! Dashboard summary for managers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::Serialize;
use ticketdesk_core::{QueueFilter, TicketFilter, TicketState};

use super::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub boards_count: i64,
    pub active_boards_count: i64,
    /// Pending standby-queue items.
    pub standby_queue_count: i64,
    /// Every state is listed, zero included.
    pub tickets_by_state: BTreeMap<&'static str, i64>,
    pub tickets_created_today: i64,
    pub tickets_created_this_week: i64,
}

/// Start of the current UTC day and of the current week (Monday).
pub fn period_starts(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let week = today - Duration::days(i64::from(now.weekday().num_days_from_monday()));
    (today, week)
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<DashboardStats>> {
    let boards = state.board_store().list(true)?;
    let active_boards_count = boards.iter().filter(|b| !b.is_archived).count() as i64;

    let standby_queue_count = state.queue_store().count(&QueueFilter::new())?;

    let tickets = state.ticket_store();
    let mut tickets_by_state = BTreeMap::new();
    for ticket_state in TicketState::ALL {
        let count = tickets.count(&TicketFilter::new().with_state(ticket_state))?;
        tickets_by_state.insert(ticket_state.as_str(), count);
    }

    let (today, week) = period_starts(Utc::now());
    let tickets_created_today = tickets.count(&TicketFilter::new().with_created_since(today))?;
    let tickets_created_this_week =
        tickets.count(&TicketFilter::new().with_created_since(week))?;

    Ok(Json(DashboardStats {
        boards_count: boards.len() as i64,
        active_boards_count,
        standby_queue_count,
        tickets_by_state,
        tickets_created_today,
        tickets_created_this_week,
    }))
}
