//! Loan rate quotes and their validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How a lender expresses the rate on a loan. All rates are decimals (0.08 = 8%).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateQuote {
    /// Stated annual rate compounded `compoundings_per_year` times.
    Nominal {
        annual_rate: f64,
        compoundings_per_year: u32,
    },
    /// True annual growth rate.
    Effective { annual_rate: f64 },
    /// "Pay back `multiplier` times the principal after `term_years`."
    LumpSum { multiplier: f64, term_years: f64 },
}

impl RateQuote {
    /// Short name of the quote form, used when only the form has been revealed.
    pub fn form(&self) -> &'static str {
        match self {
            RateQuote::Nominal { .. } => "nominal APR",
            RateQuote::Effective { .. } => "effective annual rate",
            RateQuote::LumpSum { .. } => "lump-sum repayment",
        }
    }
}

fn compounding_name(m: u32) -> String {
    match m {
        1 => "annually".to_string(),
        2 => "semiannually".to_string(),
        4 => "quarterly".to_string(),
        12 => "monthly".to_string(),
        52 => "weekly".to_string(),
        365 => "daily".to_string(),
        n => format!("{n} times a year"),
    }
}

impl fmt::Display for RateQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RateQuote::Nominal {
                annual_rate,
                compoundings_per_year,
            } => write!(
                f,
                "{:.2}% APR compounded {}",
                annual_rate * 100.0,
                compounding_name(compoundings_per_year)
            ),
            RateQuote::Effective { annual_rate } => {
                write!(f, "{:.2}% effective annual rate", annual_rate * 100.0)
            }
            RateQuote::LumpSum {
                multiplier,
                term_years,
            } => write!(
                f,
                "repay {multiplier:.3}x the principal after {term_years} years"
            ),
        }
    }
}

/// Why a quote cannot be converted to an effective rate.
#[derive(Debug, Error, PartialEq)]
pub enum QuoteError {
    #[error("quote contains a non-finite value")]
    NonFinite,
    #[error("rate must be >= 0, got {0}")]
    NegativeRate(f64),
    #[error("compounding frequency must be >= 1")]
    ZeroCompounding,
    #[error("lump-sum multiplier must be > 0, got {0}")]
    NonPositiveMultiplier(f64),
    #[error("term must be > 0 years, got {0}")]
    NonPositiveTerm(f64),
}

/// Validate a rate quote.
pub fn validate_rate_quote(q: &RateQuote) -> Result<(), QuoteError> {
    match *q {
        RateQuote::Nominal {
            annual_rate,
            compoundings_per_year,
        } => {
            validate_rate(annual_rate)?;
            if compoundings_per_year < 1 {
                return Err(QuoteError::ZeroCompounding);
            }
        }
        RateQuote::Effective { annual_rate } => validate_rate(annual_rate)?,
        RateQuote::LumpSum {
            multiplier,
            term_years,
        } => {
            if !(multiplier.is_finite() && term_years.is_finite()) {
                return Err(QuoteError::NonFinite);
            }
            if multiplier <= 0.0 {
                return Err(QuoteError::NonPositiveMultiplier(multiplier));
            }
            if term_years <= 0.0 {
                return Err(QuoteError::NonPositiveTerm(term_years));
            }
        }
    }
    Ok(())
}

fn validate_rate(rate: f64) -> Result<(), QuoteError> {
    if !rate.is_finite() {
        return Err(QuoteError::NonFinite);
    }
    if rate < 0.0 {
        return Err(QuoteError::NegativeRate(rate));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_quotes_are_rejected() {
        let zero_m = RateQuote::Nominal {
            annual_rate: 0.05,
            compoundings_per_year: 0,
        };
        assert_eq!(validate_rate_quote(&zero_m), Err(QuoteError::ZeroCompounding));
        let neg = RateQuote::Effective { annual_rate: -0.01 };
        assert!(matches!(
            validate_rate_quote(&neg),
            Err(QuoteError::NegativeRate(_))
        ));
        let lump = RateQuote::LumpSum {
            multiplier: 0.0,
            term_years: 3.0,
        };
        assert!(validate_rate_quote(&lump).is_err());
        let lump = RateQuote::LumpSum {
            multiplier: 1.5,
            term_years: 0.0,
        };
        assert!(validate_rate_quote(&lump).is_err());
        let nan = RateQuote::Effective {
            annual_rate: f64::NAN,
        };
        assert_eq!(validate_rate_quote(&nan), Err(QuoteError::NonFinite));
    }

    #[test]
    fn forms_and_labels() {
        let q = RateQuote::LumpSum {
            multiplier: 1.25,
            term_years: 3.0,
        };
        assert_eq!(q.form(), "lump-sum repayment");
        assert_eq!(q.to_string(), "repay 1.250x the principal after 3 years");
        let weekly = RateQuote::Nominal {
            annual_rate: 0.05,
            compoundings_per_year: 52,
        };
        assert_eq!(weekly.to_string(), "5.00% APR compounded weekly");
    }
}
