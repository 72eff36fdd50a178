use chrono::{DateTime, Utc};
use hive_shared::models::{Call, Report};
use hive_shared::{CallStatus, ReportReason};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::calls::{finish_call, load_call};
use crate::convert::{get_opt_uuid, get_parsed, get_ts, get_uuid, stored, ts};
use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    pub fn insert_report(
        &self,
        reporter_id: Uuid,
        reported_user_id: Uuid,
        call_id: Option<Uuid>,
        reason: ReportReason,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Report> {
        let report = new_report(reporter_id, reported_user_id, call_id, reason, description, now);
        write_report(self.conn(), &report)?;
        Ok(report)
    }

    /// Report the counterpart of `call_id` and end the call as `reported`,
    /// in one transaction. The report row is written first; the `bool` is
    /// `false` when the call had already finished.
    pub fn report_call(
        &mut self,
        call_id: Uuid,
        reporter_id: Uuid,
        reason: ReportReason,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(Call, bool, Report)> {
        let tx = self.write_tx()?;
        let call = load_call(&tx, call_id)?;
        let reported = call
            .counterpart_of(reporter_id)
            .ok_or(StoreError::NotParticipant)?;

        let report = new_report(reporter_id, reported, Some(call.id), reason, description, now);
        write_report(&tx, &report)?;

        let (call, changed) = if call.status.is_terminal() {
            (call, false)
        } else {
            (finish_call(&tx, call, CallStatus::Reported, now)?, true)
        };
        tx.commit()?;
        Ok((call, changed, report))
    }

    pub fn reports_against(&self, user_id: Uuid) -> Result<Vec<Report>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, reporter_id, reported_user_id, call_id, reason, description, created_at
             FROM reports
             WHERE reported_user_id = ?1
             ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id.to_string()], |row| {
            Ok(Report {
                id: get_uuid(row, 0)?,
                reporter_id: get_uuid(row, 1)?,
                reported_user_id: get_uuid(row, 2)?,
                call_id: get_opt_uuid(row, 3)?,
                reason: get_parsed(row, 4)?,
                description: row.get(5)?,
                created_at: get_ts(row, 6)?,
            })
        })?;

        let mut reports = Vec::new();
        for row in rows {
            reports.push(row?);
        }
        Ok(reports)
    }
}

fn new_report(
    reporter_id: Uuid,
    reported_user_id: Uuid,
    call_id: Option<Uuid>,
    reason: ReportReason,
    description: Option<&str>,
    now: DateTime<Utc>,
) -> Report {
    Report {
        id: Uuid::new_v4(),
        reporter_id,
        reported_user_id,
        call_id,
        reason,
        description: description.map(str::to_string),
        created_at: stored(now),
    }
}

fn write_report(conn: &Connection, report: &Report) -> Result<()> {
    conn.execute(
        "INSERT INTO reports (id, reporter_id, reported_user_id, call_id, reason, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            report.id.to_string(),
            report.reporter_id.to_string(),
            report.reported_user_id.to_string(),
            report.call_id.map(|id| id.to_string()),
            report.reason.as_str(),
            report.description,
            ts(&report.created_at),
        ],
    )?;

    tracing::warn!(
        report_id = %report.id,
        reported_user = %report.reported_user_id,
        reason = report.reason.as_str(),
        "user reported"
    );
    Ok(())
}
