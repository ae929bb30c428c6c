//! services/planner/src/services/classes.rs
//!
//! Class scheduling over the `classes` collection: creation, calendar range
//! reads, updates and deletion.

use chrono::{NaiveDate, Utc};
use planner_core::domain::CLASSES;
use planner_core::{
    decode_all, to_fields, ClassSession, ClassStatus, ClassType, Direction, DocumentStore, Query,
    WatchTarget,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::error::{AppError, AppResult};

/// Fields of a class to be scheduled.
#[derive(Debug, Clone)]
pub struct NewClass {
    pub topic: String,
    pub mentor: String,
    pub support_mentors: Vec<String>,
    pub manager: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub class_type: ClassType,
    pub location: Option<String>,
    pub meeting_link: Option<String>,
    pub description: Option<String>,
}

/// A partial class update; only `Some` fields are written.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_mentors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub class_type: Option<ClassType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ClassStatus>,
}

/// Drops blank entries, the main mentor and repeats, keeping first-seen order.
pub fn normalize_support_mentors(mentor: &str, support_mentors: &[String]) -> Vec<String> {
    let mut kept: Vec<String> = Vec::with_capacity(support_mentors.len());
    for id in support_mentors {
        let id = id.trim();
        if id.is_empty() || id == mentor || kept.iter().any(|k| k == id) {
            continue;
        }
        kept.push(id.to_string());
    }
    kept
}

/// Ascending by date, then by start time.
pub fn sort_classes(classes: &mut [ClassSession]) {
    classes.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.start_time.cmp(&b.start_time))
    });
}

/// First and last day of a calendar month (`month` is 1-12).
pub fn month_bounds(year: i32, month: u32) -> AppResult<(NaiveDate, NaiveDate)> {
    let invalid = || AppError::InvalidArgument(format!("{}-{} is not a valid month", year, month));
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let last = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .ok_or_else(invalid)?;
    Ok((first, last))
}

fn date_range_query(start: NaiveDate, end: NaiveDate) -> Query {
    Query::collection(CLASSES)
        .where_gte("date", start.to_string())
        .where_lte("date", end.to_string())
        .order_by("date", Direction::Asc)
}

#[derive(Clone)]
pub struct ClassService {
    store: Arc<dyn DocumentStore>,
}

impl ClassService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Schedules a class and returns its id. New classes start as `scheduled`.
    pub async fn create_class(&self, class: NewClass) -> AppResult<String> {
        let now = Utc::now();
        let record = ClassSession {
            id: String::new(),
            support_mentors: normalize_support_mentors(&class.mentor, &class.support_mentors),
            topic: class.topic,
            mentor: class.mentor,
            manager: class.manager,
            date: class.date,
            start_time: class.start_time,
            end_time: class.end_time,
            class_type: class.class_type,
            location: class.location,
            meeting_link: class.meeting_link,
            description: class.description,
            status: ClassStatus::Scheduled,
            created_at: now,
            updated_at: now,
        };
        let id = self.store.add(CLASSES, to_fields(&record)?).await?;
        info!("Class {} created for {}", id, record.date);
        Ok(id)
    }

    pub async fn get_class(&self, class_id: &str) -> AppResult<ClassSession> {
        let doc = self
            .store
            .get(CLASSES, class_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("class {}", class_id)))?;
        Ok(doc.decode()?)
    }

    /// Classes of one calendar month, by date then start time.
    pub async fn get_classes_by_month(&self, year: i32, month: u32) -> AppResult<Vec<ClassSession>> {
        let (first, last) = month_bounds(year, month)?;
        self.get_classes_by_week(first, last).await
    }

    /// Classes between two dates, both inclusive, by date then start time.
    pub async fn get_classes_by_week(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<ClassSession>> {
        let docs = self.store.query(&date_range_query(start, end)).await?;
        let mut classes: Vec<ClassSession> = decode_all(&docs)?;
        sort_classes(&mut classes);
        Ok(classes)
    }

    /// Classes of a single day, by start time.
    pub async fn get_classes_for_day(&self, date: NaiveDate) -> AppResult<Vec<ClassSession>> {
        let docs = self
            .store
            .query(&Query::collection(CLASSES).where_eq("date", date.to_string()))
            .await?;
        let mut classes: Vec<ClassSession> = decode_all(&docs)?;
        sort_classes(&mut classes);
        Ok(classes)
    }

    /// Applies the provided fields to an existing class. The support mentor
    /// list is re-normalized whenever it or the mentor changes.
    pub async fn update_class(&self, class_id: &str, patch: ClassPatch) -> AppResult<()> {
        let current = self.get_class(class_id).await?;

        let mut patch = patch;
        if patch.mentor.is_some() || patch.support_mentors.is_some() {
            let mentor = patch.mentor.clone().unwrap_or(current.mentor);
            let support = patch.support_mentors.take().unwrap_or(current.support_mentors);
            patch.support_mentors = Some(normalize_support_mentors(&mentor, &support));
        }

        let mut fields = to_fields(&patch)?;
        if let Value::Object(map) = &mut fields {
            map.insert("updatedAt".to_string(), serde_json::json!(Utc::now()));
        }
        self.store.update(CLASSES, class_id, fields).await?;
        info!("Class {} updated", class_id);
        Ok(())
    }

    pub async fn delete_class(&self, class_id: &str) -> AppResult<()> {
        self.store.delete(CLASSES, class_id).await?;
        info!("Class {} deleted", class_id);
        Ok(())
    }

    pub fn classes_by_month_target(&self, year: i32, month: u32) -> AppResult<WatchTarget> {
        let (first, last) = month_bounds(year, month)?;
        Ok(WatchTarget::Query(date_range_query(first, last)))
    }

    /// Every class, by date. Used for per-user feeds, which filter client-side.
    pub fn classes_target(&self) -> WatchTarget {
        WatchTarget::Query(Query::collection(CLASSES).order_by("date", Direction::Asc))
    }
}
