use hive_shared::models::TriviaQuestion;
use rusqlite::params;

use crate::convert::{get_json, get_ts, get_uuid};
use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Up to `limit` questions in random order.
    pub fn trivia_questions(&self, limit: u32) -> Result<Vec<TriviaQuestion>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, question, options, correct_answer, category, difficulty, language, created_at
             FROM trivia_questions
             ORDER BY RANDOM()
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(TriviaQuestion {
                id: get_uuid(row, 0)?,
                question: row.get(1)?,
                options: get_json(row, 2)?,
                correct_answer: row.get(3)?,
                category: row.get(4)?,
                difficulty: row.get(5)?,
                language: row.get(6)?,
                created_at: get_ts(row, 7)?,
            })
        })?;

        let mut questions = Vec::new();
        for row in rows {
            questions.push(row?);
        }
        Ok(questions)
    }
}
