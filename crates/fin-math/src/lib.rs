#![deny(warnings)]

//! Time-value-of-money helpers for the classroom games.
//!
//! This crate provides validated, pure functions for:
//! - Converting quoted rates (nominal, effective, lump sum) to effective annual rates
//! - Present and future values of single sums, annuities, perpetuities and bonds
//! - Investment decision rules: NPV, IRR, payback period, profitability index
//! - Corporate finance formulas used by the games: CAPM, WACC, incremental earnings
//!
//! Rates are decimals (0.08 = 8%). No function returns NaN or an infinity
//! except `payback_period`, whose `f64::INFINITY` is a documented sentinel.

use thiserror::Error;

mod quote;

pub use quote::{validate_rate_quote, QuoteError, RateQuote};

/// Errors produced by finance helpers.
#[derive(Debug, Error, PartialEq)]
pub enum FinanceError {
    /// A precondition was violated or the result would not be finite.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The NPV has the same sign at both ends of the IRR bracket.
    #[error("no sign change in NPV over [{lower}, {upper}]")]
    NoSignChange { lower: f64, upper: f64 },
}

impl From<QuoteError> for FinanceError {
    fn from(e: QuoteError) -> Self {
        FinanceError::InvalidInput(e.to_string())
    }
}

fn invalid(msg: impl Into<String>) -> FinanceError {
    FinanceError::InvalidInput(msg.into())
}

fn finite(value: f64, what: &str) -> Result<f64, FinanceError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid(format!("{what} is not finite")))
    }
}

fn finite_inputs(values: &[f64]) -> Result<(), FinanceError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(invalid("non-finite input"))
    }
}

fn check_period_rate(rate: f64) -> Result<(), FinanceError> {
    if rate <= -1.0 {
        return Err(invalid(format!("period rate must be > -1, got {rate}")));
    }
    Ok(())
}

fn check_periods(periods: f64) -> Result<(), FinanceError> {
    if periods < 0.0 {
        return Err(invalid(format!("periods must be >= 0, got {periods}")));
    }
    Ok(())
}

/// Effective annual rate implied by a quote.
///
/// - Nominal: `(1 + r/m)^m - 1`
/// - Effective: identity
/// - LumpSum: `multiplier^(1/term) - 1`
///
/// Example:
/// let ear = effective_annual_rate(&RateQuote::Effective { annual_rate: 0.05 }).unwrap();
/// assert_eq!(ear, 0.05);
pub fn effective_annual_rate(quote: &RateQuote) -> Result<f64, FinanceError> {
    validate_rate_quote(quote)?;
    let ear = match *quote {
        RateQuote::Nominal {
            annual_rate,
            compoundings_per_year,
        } => {
            let m = f64::from(compoundings_per_year);
            (1.0 + annual_rate / m).powf(m) - 1.0
        }
        RateQuote::Effective { annual_rate } => annual_rate,
        RateQuote::LumpSum {
            multiplier,
            term_years,
        } => multiplier.powf(1.0 / term_years) - 1.0,
    };
    finite(ear, "effective annual rate")
}

/// Real rate from an effective nominal rate and inflation (Fisher relation).
///
/// `(1 + nominal) / (1 + inflation) - 1`; inflation must be > -1.
pub fn real_rate(nominal_effective: f64, inflation: f64) -> Result<f64, FinanceError> {
    finite_inputs(&[nominal_effective, inflation])?;
    if inflation <= -1.0 {
        return Err(invalid(format!("inflation must be > -1, got {inflation}")));
    }
    finite(
        (1.0 + nominal_effective) / (1.0 + inflation) - 1.0,
        "real rate",
    )
}

/// `fv / (1 + r)^n`.
pub fn present_value_single_sum(
    future_value: f64,
    period_rate: f64,
    periods: f64,
) -> Result<f64, FinanceError> {
    finite_inputs(&[future_value, period_rate, periods])?;
    check_period_rate(period_rate)?;
    check_periods(periods)?;
    finite(
        future_value / (1.0 + period_rate).powf(periods),
        "present value",
    )
}

/// `pv * (1 + r)^n`, the inverse of [`present_value_single_sum`].
pub fn future_value_single_sum(
    present_value: f64,
    period_rate: f64,
    periods: f64,
) -> Result<f64, FinanceError> {
    finite_inputs(&[present_value, period_rate, periods])?;
    check_period_rate(period_rate)?;
    check_periods(periods)?;
    finite(
        present_value * (1.0 + period_rate).powf(periods),
        "future value",
    )
}

/// Present value of an ordinary (end-of-period) annuity.
///
/// `c * (1 - (1 + r)^-n) / r`, degrading to `c * n` at a zero rate.
///
/// Example:
/// let pv = present_value_annuity(100.0, 0.0, 5.0).unwrap();
/// assert_eq!(pv, 500.0);
pub fn present_value_annuity(
    payment: f64,
    period_rate: f64,
    num_periods: f64,
) -> Result<f64, FinanceError> {
    finite_inputs(&[payment, period_rate, num_periods])?;
    check_period_rate(period_rate)?;
    check_periods(num_periods)?;
    if period_rate == 0.0 {
        return Ok(payment * num_periods);
    }
    finite(
        payment * discount_sum(period_rate, num_periods),
        "annuity present value",
    )
}

/// Future value of an ordinary annuity, `c * ((1 + r)^n - 1) / r`.
pub fn future_value_annuity(
    payment: f64,
    period_rate: f64,
    num_periods: f64,
) -> Result<f64, FinanceError> {
    finite_inputs(&[payment, period_rate, num_periods])?;
    check_period_rate(period_rate)?;
    check_periods(num_periods)?;
    if period_rate == 0.0 {
        return Ok(payment * num_periods);
    }
    // (1 + r)^n - 1 without cancellation for tiny r
    let growth = (num_periods * period_rate.ln_1p()).exp_m1();
    finite(payment * growth / period_rate, "annuity future value")
}

/// Level payment that amortizes `present_value` over `num_periods`.
pub fn annuity_payment(
    present_value: f64,
    period_rate: f64,
    num_periods: f64,
) -> Result<f64, FinanceError> {
    finite_inputs(&[present_value, period_rate, num_periods])?;
    check_period_rate(period_rate)?;
    if num_periods <= 0.0 {
        return Err(invalid("an amortizing loan needs at least one period"));
    }
    if period_rate == 0.0 {
        return Ok(present_value / num_periods);
    }
    finite(
        present_value / discount_sum(period_rate, num_periods),
        "annuity payment",
    )
}

/// `(1 - (1 + r)^-n) / r`, computed through `ln_1p`/`exp_m1` so it stays
/// accurate as `r` approaches zero. Callers handle `r == 0`.
fn discount_sum(period_rate: f64, num_periods: f64) -> f64 {
    -(-num_periods * period_rate.ln_1p()).exp_m1() / period_rate
}

/// `c / r`; the rate must be strictly positive.
pub fn present_value_perpetuity(payment: f64, period_rate: f64) -> Result<f64, FinanceError> {
    finite_inputs(&[payment, period_rate])?;
    if period_rate <= 0.0 {
        return Err(invalid(format!(
            "perpetuity needs a positive rate, got {period_rate}"
        )));
    }
    finite(payment / period_rate, "perpetuity present value")
}

/// Price of a level-coupon bond.
///
/// Coupon per period `C = coupon_rate * face / ppy`, yield per period
/// `y = yield / ppy`, `N = ppy * years`; price is the coupon annuity plus the
/// discounted face. A zero coupon rate drops the annuity term.
pub fn present_value_bond(
    face_value: f64,
    coupon_rate_per_year: f64,
    payments_per_year: u32,
    years_to_maturity: f64,
    yield_per_year: f64,
) -> Result<f64, FinanceError> {
    finite_inputs(&[
        face_value,
        coupon_rate_per_year,
        years_to_maturity,
        yield_per_year,
    ])?;
    if payments_per_year < 1 {
        return Err(invalid("a bond needs at least one payment per year"));
    }
    if coupon_rate_per_year < 0.0 {
        return Err(invalid("coupon rate must be >= 0"));
    }
    let ppy = f64::from(payments_per_year);
    let coupon = coupon_rate_per_year * face_value / ppy;
    let y = yield_per_year / ppy;
    let n = ppy * years_to_maturity;
    let coupons = if coupon == 0.0 {
        0.0
    } else {
        coupon * present_value_annuity(1.0, y, n)?
    };
    let principal = present_value_single_sum(face_value, y, n)?;
    finite(coupons + principal, "bond price")
}

fn npv_unchecked(period_rate: f64, cash_flows: &[f64]) -> f64 {
    let base = 1.0 + period_rate;
    cash_flows
        .iter()
        .zip(0i32..)
        .map(|(cf, t)| cf / base.powi(t))
        .sum()
}

/// `sum(CF_t / (1 + r)^t)` with `t` starting at 0.
///
/// Example:
/// let npv = net_present_value(0.10, &[-100.0, 110.0]).unwrap();
/// assert!(npv.abs() < 1e-9);
pub fn net_present_value(period_rate: f64, cash_flows: &[f64]) -> Result<f64, FinanceError> {
    if cash_flows.is_empty() {
        return Err(invalid("no cash flows"));
    }
    finite_inputs(cash_flows)?;
    finite_inputs(&[period_rate])?;
    check_period_rate(period_rate)?;
    finite(npv_unchecked(period_rate, cash_flows), "net present value")
}

/// Bracket and budget for the IRR bisection.
#[derive(Clone, Debug, PartialEq)]
pub struct IrrConfig {
    pub lower: f64,
    pub upper: f64,
    pub max_iterations: u32,
    /// Early exit once `|NPV|` falls below this.
    pub tolerance: f64,
}

impl Default for IrrConfig {
    fn default() -> Self {
        Self {
            lower: -0.99,
            upper: 5.0,
            max_iterations: 80,
            tolerance: 1e-10,
        }
    }
}

/// Internal rate of return with the default bracket `[-0.99, 5.0]`.
pub fn internal_rate_of_return(cash_flows: &[f64]) -> Result<f64, FinanceError> {
    internal_rate_of_return_with(cash_flows, &IrrConfig::default())
}

/// Bisection root-find of `NPV(r) = 0` over `cfg`'s bracket.
///
/// Fails with `NoSignChange` when the endpoint NPVs share a sign or either is
/// non-finite. On iteration exhaustion the bracket midpoint is returned; it
/// is an approximation, not an exact root.
pub fn internal_rate_of_return_with(
    cash_flows: &[f64],
    cfg: &IrrConfig,
) -> Result<f64, FinanceError> {
    if cash_flows.is_empty() {
        return Err(invalid("no cash flows"));
    }
    finite_inputs(cash_flows)?;
    if !(cfg.lower > -1.0 && cfg.lower < cfg.upper && cfg.upper.is_finite()) {
        return Err(invalid("IRR bracket must satisfy -1 < lower < upper"));
    }
    let no_root = || FinanceError::NoSignChange {
        lower: cfg.lower,
        upper: cfg.upper,
    };

    let mut lo = cfg.lower;
    let mut hi = cfg.upper;
    let mut f_lo = npv_unchecked(lo, cash_flows);
    let f_hi = npv_unchecked(hi, cash_flows);
    if !(f_lo.is_finite() && f_hi.is_finite()) {
        return Err(no_root());
    }
    if f_lo.abs() < cfg.tolerance {
        return Ok(lo);
    }
    if f_hi.abs() < cfg.tolerance {
        return Ok(hi);
    }
    if (f_lo > 0.0) == (f_hi > 0.0) {
        return Err(no_root());
    }

    for _ in 0..cfg.max_iterations {
        let mid = 0.5 * (lo + hi);
        let f_mid = npv_unchecked(mid, cash_flows);
        if !f_mid.is_finite() {
            return Err(invalid("NPV is not finite inside the IRR bracket"));
        }
        if f_mid.abs() < cfg.tolerance {
            return Ok(mid);
        }
        if (f_mid > 0.0) == (f_lo > 0.0) {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    Ok(0.5 * (lo + hi))
}

/// Fractional period at which cumulative inflows recover the initial outlay.
///
/// `cash_flows[0]` must be negative; later entries are applied in order.
/// Returns `f64::INFINITY` when the outlay is never recovered within the
/// horizon; callers must treat that as "no payback", not as a number.
pub fn payback_period(cash_flows: &[f64]) -> Result<f64, FinanceError> {
    let (first, rest) = cash_flows
        .split_first()
        .ok_or_else(|| invalid("no cash flows"))?;
    finite_inputs(cash_flows)?;
    if *first >= 0.0 {
        return Err(invalid("payback needs a negative initial cash flow"));
    }
    let mut outstanding = -first;
    for (t, cf) in rest.iter().enumerate() {
        if *cf > 0.0 && *cf >= outstanding {
            return Ok(t as f64 + outstanding / cf);
        }
        outstanding -= cf;
    }
    Ok(f64::INFINITY)
}

/// Present value of the inflows per unit of initial investment.
pub fn profitability_index(period_rate: f64, cash_flows: &[f64]) -> Result<f64, FinanceError> {
    let (first, _) = cash_flows
        .split_first()
        .ok_or_else(|| invalid("no cash flows"))?;
    if *first >= 0.0 {
        return Err(invalid(
            "profitability index needs a negative initial cash flow",
        ));
    }
    if cash_flows.len() < 2 {
        return Err(invalid("profitability index needs at least one inflow"));
    }
    let npv = net_present_value(period_rate, cash_flows)?;
    finite((npv - first) / -first, "profitability index")
}

/// CAPM: `rf + beta * mrp`.
pub fn capm_cost_of_equity(
    risk_free: f64,
    beta: f64,
    market_risk_premium: f64,
) -> Result<f64, FinanceError> {
    finite_inputs(&[risk_free, beta, market_risk_premium])?;
    finite(risk_free + beta * market_risk_premium, "cost of equity")
}

/// After-tax weighted average cost of capital.
///
/// `E/V * r_e + D/V * r_d * (1 - t)` with `V = E + D`.
pub fn weighted_average_cost_of_capital(
    equity_value: f64,
    debt_value: f64,
    cost_of_equity: f64,
    cost_of_debt: f64,
    tax_rate: f64,
) -> Result<f64, FinanceError> {
    finite_inputs(&[
        equity_value,
        debt_value,
        cost_of_equity,
        cost_of_debt,
        tax_rate,
    ])?;
    if equity_value < 0.0 || debt_value < 0.0 {
        return Err(invalid("capital values must be >= 0"));
    }
    let total = equity_value + debt_value;
    if total <= 0.0 {
        return Err(invalid("firm value must be > 0"));
    }
    check_tax(tax_rate)?;
    finite(
        equity_value / total * cost_of_equity
            + debt_value / total * cost_of_debt * (1.0 - tax_rate),
        "WACC",
    )
}

fn check_tax(tax_rate: f64) -> Result<(), FinanceError> {
    if !(0.0..1.0).contains(&tax_rate) {
        return Err(invalid(format!("tax rate must be in [0, 1), got {tax_rate}")));
    }
    Ok(())
}

/// Annual straight-line depreciation.
pub fn straight_line_depreciation(cost: f64, life_years: f64) -> Result<f64, FinanceError> {
    finite_inputs(&[cost, life_years])?;
    if cost < 0.0 {
        return Err(invalid("asset cost must be >= 0"));
    }
    if life_years <= 0.0 {
        return Err(invalid("asset life must be > 0"));
    }
    finite(cost / life_years, "depreciation")
}

/// Unlevered incremental earnings: `(revenue - costs - depreciation) * (1 - t)`.
pub fn incremental_earnings(
    revenue: f64,
    operating_costs: f64,
    depreciation: f64,
    tax_rate: f64,
) -> Result<f64, FinanceError> {
    finite_inputs(&[revenue, operating_costs, depreciation, tax_rate])?;
    check_tax(tax_rate)?;
    finite(
        (revenue - operating_costs - depreciation) * (1.0 - tax_rate),
        "incremental earnings",
    )
}

/// `earnings + depreciation - capex - ΔNWC`.
pub fn free_cash_flow(
    earnings: f64,
    depreciation: f64,
    capital_expenditure: f64,
    change_in_nwc: f64,
) -> Result<f64, FinanceError> {
    finite_inputs(&[earnings, depreciation, capital_expenditure, change_in_nwc])?;
    finite(
        earnings + depreciation - capital_expenditure - change_in_nwc,
        "free cash flow",
    )
}
