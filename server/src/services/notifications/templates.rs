//! Email bodies. All user-provided text goes through [`escape`].

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;

use super::mailer::Email;
use crate::domain::scheduling::ReminderKind;

/// Turkey has been on a fixed UTC+3 offset since 2016.
const TURKEY_OFFSET_SECS: i32 = 3 * 3600;

pub struct LessonDetails<'a> {
    pub student_name: &'a str,
    pub teacher_name: &'a str,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub price: Decimal,
    pub meeting_link: Option<&'a str>,
}

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn format_local(time: DateTime<Utc>) -> String {
    let offset = FixedOffset::east_opt(TURKEY_OFFSET_SECS).expect("UTC+3 is a valid offset");
    time.with_timezone(&offset).format("%d.%m.%Y %H:%M").to_string()
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<div style=\"font-family:Arial,sans-serif;max-width:560px;margin:auto\">\
         <h2 style=\"color:#1e3a8a\">{}</h2>{}\
         <p style=\"color:#6b7280;font-size:12px\">EduPremium</p></div>",
        escape(title),
        body
    )
}

fn lesson_table(lesson: &LessonDetails<'_>) -> String {
    let link = match lesson.meeting_link {
        Some(url) => format!(
            "<p><a href=\"{0}\">Derse katıl</a></p>",
            escape(url)
        ),
        None => "<p>Ders bağlantısı dersten önce paylaşılacaktır.</p>".to_string(),
    };
    format!(
        "<p><b>Öğretmen:</b> {}<br><b>Öğrenci:</b> {}<br><b>Başlangıç:</b> {}<br><b>Bitiş:</b> {}</p>{}",
        escape(lesson.teacher_name),
        escape(lesson.student_name),
        format_local(lesson.start_time),
        format_local(lesson.end_time),
        link
    )
}

pub fn lesson_confirmed_student(to: &str, lesson: &LessonDetails<'_>) -> Email {
    let title = "Dersiniz onaylandı";
    let body = format!(
        "<p>Merhaba {},</p><p>Ödemeniz alındı ve dersiniz planlandı. Ödenen tutar: {} TL</p>{}",
        escape(lesson.student_name),
        lesson.price.round_dp(2),
        lesson_table(lesson)
    );
    Email {
        to: to.to_string(),
        subject: title.to_string(),
        html: layout(title, &body),
    }
}

pub fn lesson_confirmed_teacher(to: &str, lesson: &LessonDetails<'_>) -> Email {
    let title = "Yeni ders rezervasyonu";
    let body = format!(
        "<p>Merhaba {},</p><p>{} sizinle bir ders rezerve etti.</p>{}",
        escape(lesson.teacher_name),
        escape(lesson.student_name),
        lesson_table(lesson)
    );
    Email {
        to: to.to_string(),
        subject: title.to_string(),
        html: layout(title, &body),
    }
}

pub fn lesson_reminder(
    to: &str,
    recipient_name: &str,
    kind: ReminderKind,
    lesson: &LessonDetails<'_>,
) -> Email {
    let title = match kind {
        ReminderKind::DayBefore => "Yarın dersiniz var",
        ReminderKind::HourBefore => "Dersiniz 1 saat içinde başlıyor",
    };
    let body = format!(
        "<p>Merhaba {},</p>{}",
        escape(recipient_name),
        lesson_table(lesson)
    );
    Email {
        to: to.to_string(),
        subject: title.to_string(),
        html: layout(title, &body),
    }
}

pub fn lesson_reminder_sms(kind: ReminderKind, lesson: &LessonDetails<'_>) -> String {
    let when = match kind {
        ReminderKind::DayBefore => "yarin",
        ReminderKind::HourBefore => "1 saat icinde",
    };
    format!(
        "EduPremium: {} ile dersiniz {} ({}) basliyor.",
        lesson.teacher_name,
        when,
        format_local(lesson.start_time)
    )
}

pub fn lesson_cancelled(to: &str, recipient_name: &str, lesson: &LessonDetails<'_>) -> Email {
    let title = "Ders iptal edildi";
    let body = format!(
        "<p>Merhaba {},</p><p>Aşağıdaki ders iptal edildi.</p>{}",
        escape(recipient_name),
        lesson_table(lesson)
    );
    Email {
        to: to.to_string(),
        subject: title.to_string(),
        html: layout(title, &body),
    }
}

pub fn package_purchased(
    to: &str,
    student_name: &str,
    teacher_name: &str,
    lesson_count: i32,
    amount: Decimal,
) -> Email {
    let title = "Paketiniz aktif";
    let body = format!(
        "<p>Merhaba {},</p><p>{} ile {} derslik paketiniz aktif edildi. Ödenen tutar: {} TL</p>\
         <p>Derslerinizi öğretmeninizin uygun saatlerinden planlayabilirsiniz.</p>",
        escape(student_name),
        escape(teacher_name),
        lesson_count,
        amount.round_dp(2)
    );
    Email {
        to: to.to_string(),
        subject: title.to_string(),
        html: layout(title, &body),
    }
}

pub fn featured_activated(
    to: &str,
    teacher_name: &str,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> Email {
    let title = "Vitrin yerleşiminiz aktif";
    let body = format!(
        "<p>Merhaba {},</p><p>Profiliniz {} ile {} arasında vitrinde öne çıkarılacak.</p>",
        escape(teacher_name),
        format_local(starts_at),
        format_local(ends_at)
    );
    Email {
        to: to.to_string(),
        subject: title.to_string(),
        html: layout(title, &body),
    }
}
