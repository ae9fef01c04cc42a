use chrono::NaiveDate;

/// How soon a product needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryBand {
    Expired,
    /// Within the next week.
    Soon,
    Safe,
    /// No date, or a date we could not parse.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryStatus {
    pub band: ExpiryBand,
    /// Calendar days until expiry; negative once past it. None when unknown.
    pub days: Option<i64>,
}

const SOON_WINDOW_DAYS: i64 = 7;

/// Classify an ISO `YYYY-MM-DD` expiry date relative to `today`.
pub fn dynamic_status(expiry_date: Option<&str>, today: NaiveDate) -> ExpiryStatus {
    let Some(raw) = expiry_date else {
        return ExpiryStatus {
            band: ExpiryBand::Unknown,
            days: None,
        };
    };

    let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") else {
        return ExpiryStatus {
            band: ExpiryBand::Unknown,
            days: None,
        };
    };

    let days = (date - today).num_days();
    let band = if days < 0 {
        ExpiryBand::Expired
    } else if days <= SOON_WINDOW_DAYS {
        ExpiryBand::Soon
    } else {
        ExpiryBand::Safe
    };

    ExpiryStatus {
        band,
        days: Some(days),
    }
}

impl ExpiryStatus {
    pub fn label(&self) -> String {
        match (self.band, self.days) {
            (ExpiryBand::Expired, Some(d)) => format!("expired {} day(s) ago", -d),
            (ExpiryBand::Soon, Some(d)) => format!("expires within {} day(s)", d),
            (ExpiryBand::Safe, Some(d)) => format!("{} day(s) left", d),
            _ => "no expiry date".to_string(),
        }
    }
}
