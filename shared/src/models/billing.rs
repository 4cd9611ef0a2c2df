//! Invoice, payment and payroll models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Patient, StaffSummary};
use crate::types::{EntityRef, HasId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    PartiallyPaid,
    Overdue,
    Cancelled,
}

/// A billable line on an invoice
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Percentage, e.g. 7 for 7%
    #[serde(default)]
    pub tax_rate: Decimal,
}

impl InvoiceLine {
    pub fn subtotal(&self) -> Decimal {
        self.quantity * self.unit_price
    }

    pub fn tax(&self) -> Decimal {
        (self.subtotal() * self.tax_rate / Decimal::from(100)).round_dp(2)
    }

    pub fn total(&self) -> Decimal {
        self.subtotal() + self.tax()
    }
}

/// Sum of all line totals, rounded to cents
pub fn invoice_total(lines: &[InvoiceLine]) -> Decimal {
    lines.iter().map(InvoiceLine::total).sum::<Decimal>().round_dp(2)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    #[serde(alias = "_id")]
    pub id: String,
    pub invoice_number: String,
    pub patient_id: EntityRef<Patient>,
    #[serde(default)]
    pub items: Vec<InvoiceLine>,
    pub status: InvoiceStatus,
    #[serde(default)]
    pub currency: Option<String>,
    pub total_amount: Decimal,
    #[serde(default)]
    pub amount_paid: Decimal,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl HasId for Invoice {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Invoice {
    pub fn balance_due(&self) -> Decimal {
        (self.total_amount - self.amount_paid).max(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoiceInput {
    pub patient_id: String,
    pub items: Vec<InvoiceLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateInvoiceInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<InvoiceLine>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<InvoiceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvoiceFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<InvoiceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Insurance,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    #[serde(alias = "_id")]
    pub id: String,
    pub invoice_id: String,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub paid_at: DateTime<Utc>,
    #[serde(default)]
    pub reference: Option<String>,
}

impl HasId for Payment {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentInput {
    pub invoice_id: String,
    pub amount: Decimal,
    pub method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePaymentInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<PaymentMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayrollStatus {
    Pending,
    Approved,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayrollEntry {
    #[serde(alias = "_id")]
    pub id: String,
    pub employee_id: EntityRef<StaffSummary>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub base_salary: Decimal,
    #[serde(default)]
    pub bonuses: Decimal,
    #[serde(default)]
    pub deductions: Decimal,
    pub status: PayrollStatus,
}

impl HasId for PayrollEntry {
    fn id(&self) -> &str {
        &self.id
    }
}

impl PayrollEntry {
    pub fn net_pay(&self) -> Decimal {
        self.base_salary + self.bonuses - self.deductions
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePayrollInput {
    pub employee_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub base_salary: Decimal,
    #[serde(default)]
    pub bonuses: Decimal,
    #[serde(default)]
    pub deductions: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePayrollInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonuses: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deductions: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PayrollStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_invoice_total_with_tax() {
        let lines = vec![
            InvoiceLine {
                description: "Consultation".to_string(),
                quantity: dec("1"),
                unit_price: dec("100.00"),
                tax_rate: dec("7"),
            },
            InvoiceLine {
                description: "Bandage".to_string(),
                quantity: dec("3"),
                unit_price: dec("2.50"),
                tax_rate: Decimal::ZERO,
            },
        ];
        assert_eq!(invoice_total(&lines), dec("114.50"));
        assert_eq!(invoice_total(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_amounts_accept_numbers_and_strings() {
        let line: InvoiceLine = serde_json::from_str(
            r#"{"description": "X-ray", "quantity": 2, "unit_price": "45.5"}"#,
        )
        .unwrap();
        assert_eq!(line.total(), dec("91.0"));
    }

    #[test]
    fn test_payroll_net_pay() {
        let entry = PayrollEntry {
            id: "p1".to_string(),
            employee_id: EntityRef::Id("e1".to_string()),
            period_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            base_salary: dec("3000"),
            bonuses: dec("250"),
            deductions: dec("400"),
            status: PayrollStatus::Pending,
        };
        assert_eq!(entry.net_pay(), dec("2850"));
    }
}
