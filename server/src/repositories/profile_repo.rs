use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::profile::{
    Contact, StudentProfile, TeacherProfile, UpdateStudentProfile, UpdateTeacherProfile,
};

const STUDENT_COLUMNS: &str = "user_id, full_name, phone, grade_level, created_at, updated_at";

const TEACHER_COLUMNS: &str = "\
    user_id, full_name, phone, bio, branch, subjects, hourly_rate, iban, \
    is_approved, featured_until, created_at, updated_at";

pub struct ProfileRepo;

impl ProfileRepo {
    pub async fn create_student(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
        full_name: &str,
    ) -> Result<StudentProfile, sqlx::Error> {
        let query = format!(
            "INSERT INTO student_profiles (user_id, full_name) VALUES ($1, $2) \
             RETURNING {STUDENT_COLUMNS}"
        );
        sqlx::query_as::<_, StudentProfile>(&query)
            .bind(user_id)
            .bind(full_name)
            .fetch_one(db)
            .await
    }

    pub async fn create_teacher(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
        full_name: &str,
    ) -> Result<TeacherProfile, sqlx::Error> {
        let query = format!(
            "INSERT INTO teacher_profiles (user_id, full_name) VALUES ($1, $2) \
             RETURNING {TEACHER_COLUMNS}"
        );
        sqlx::query_as::<_, TeacherProfile>(&query)
            .bind(user_id)
            .bind(full_name)
            .fetch_one(db)
            .await
    }

    pub async fn find_student(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
    ) -> Result<Option<StudentProfile>, sqlx::Error> {
        let query = format!("SELECT {STUDENT_COLUMNS} FROM student_profiles WHERE user_id = $1");
        sqlx::query_as::<_, StudentProfile>(&query)
            .bind(user_id)
            .fetch_optional(db)
            .await
    }

    pub async fn find_teacher(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
    ) -> Result<Option<TeacherProfile>, sqlx::Error> {
        let query = format!("SELECT {TEACHER_COLUMNS} FROM teacher_profiles WHERE user_id = $1");
        sqlx::query_as::<_, TeacherProfile>(&query)
            .bind(user_id)
            .fetch_optional(db)
            .await
    }

    /// Row-locks the teacher profile for the rest of the transaction.
    pub async fn find_teacher_for_update(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
    ) -> Result<Option<TeacherProfile>, sqlx::Error> {
        let query = format!(
            "SELECT {TEACHER_COLUMNS} FROM teacher_profiles WHERE user_id = $1 FOR UPDATE"
        );
        sqlx::query_as::<_, TeacherProfile>(&query)
            .bind(user_id)
            .fetch_optional(db)
            .await
    }

    pub async fn update_student(
        pool: &PgPool,
        user_id: Uuid,
        input: &UpdateStudentProfile,
    ) -> Result<Option<StudentProfile>, sqlx::Error> {
        let query = format!(
            "UPDATE student_profiles SET \
                full_name = COALESCE($2, full_name), \
                phone = COALESCE($3, phone), \
                grade_level = COALESCE($4, grade_level), \
                updated_at = NOW() \
             WHERE user_id = $1 \
             RETURNING {STUDENT_COLUMNS}"
        );
        sqlx::query_as::<_, StudentProfile>(&query)
            .bind(user_id)
            .bind(input.full_name.as_deref())
            .bind(input.phone.as_deref())
            .bind(input.grade_level.as_deref())
            .fetch_optional(pool)
            .await
    }

    pub async fn update_teacher(
        pool: &PgPool,
        user_id: Uuid,
        input: &UpdateTeacherProfile,
    ) -> Result<Option<TeacherProfile>, sqlx::Error> {
        let query = format!(
            "UPDATE teacher_profiles SET \
                full_name = COALESCE($2, full_name), \
                phone = COALESCE($3, phone), \
                bio = COALESCE($4, bio), \
                branch = COALESCE($5, branch), \
                subjects = COALESCE($6, subjects), \
                hourly_rate = COALESCE($7, hourly_rate), \
                iban = COALESCE($8, iban), \
                updated_at = NOW() \
             WHERE user_id = $1 \
             RETURNING {TEACHER_COLUMNS}"
        );
        sqlx::query_as::<_, TeacherProfile>(&query)
            .bind(user_id)
            .bind(input.full_name.as_deref())
            .bind(input.phone.as_deref())
            .bind(input.bio.as_deref())
            .bind(input.branch.as_deref())
            .bind(input.subjects.clone())
            .bind(input.hourly_rate)
            .bind(input.iban.as_deref())
            .fetch_optional(pool)
            .await
    }

    /// Approved teachers, currently featured ones first.
    pub async fn list_approved_teachers(
        pool: &PgPool,
        branch: Option<&str>,
    ) -> Result<Vec<TeacherProfile>, sqlx::Error> {
        let query = format!(
            "SELECT {TEACHER_COLUMNS} FROM teacher_profiles \
             WHERE is_approved AND ($1::text IS NULL OR branch = $1) \
             ORDER BY (featured_until IS NOT NULL AND featured_until > NOW()) DESC, full_name"
        );
        sqlx::query_as::<_, TeacherProfile>(&query)
            .bind(branch)
            .fetch_all(pool)
            .await
    }

    pub async fn list_unapproved_teachers(pool: &PgPool) -> Result<Vec<TeacherProfile>, sqlx::Error> {
        let query = format!(
            "SELECT {TEACHER_COLUMNS} FROM teacher_profiles \
             WHERE NOT is_approved ORDER BY created_at"
        );
        sqlx::query_as::<_, TeacherProfile>(&query)
            .fetch_all(pool)
            .await
    }

    pub async fn set_approved(
        pool: &PgPool,
        user_id: Uuid,
        approved: bool,
    ) -> Result<Option<TeacherProfile>, sqlx::Error> {
        let query = format!(
            "UPDATE teacher_profiles SET is_approved = $2, updated_at = NOW() \
             WHERE user_id = $1 RETURNING {TEACHER_COLUMNS}"
        );
        sqlx::query_as::<_, TeacherProfile>(&query)
            .bind(user_id)
            .bind(approved)
            .fetch_optional(pool)
            .await
    }

    pub async fn set_featured_until(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
        until: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE teacher_profiles SET featured_until = $2, updated_at = NOW() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(until)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Email and name of any user, from whichever profile table holds them.
    pub async fn contact(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
    ) -> Result<Option<Contact>, sqlx::Error> {
        sqlx::query_as::<_, Contact>(
            "SELECT u.id AS user_id, u.email, \
                    COALESCE(s.full_name, t.full_name, u.email) AS full_name, \
                    COALESCE(s.phone, t.phone) AS phone \
             FROM users u \
             LEFT JOIN student_profiles s ON s.user_id = u.id \
             LEFT JOIN teacher_profiles t ON t.user_id = u.id \
             WHERE u.id = $1",
        )
        .bind(user_id)
        .fetch_optional(db)
        .await
    }
}
