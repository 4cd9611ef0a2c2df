//! Invoice, payment and payroll services

use std::time::Duration;

use rust_decimal::Decimal;
use shared::{
    validate_entity_id, CreateInvoiceInput, CreatePaymentInput, CreatePayrollInput, Invoice,
    InvoiceFilter, ListParams, Payment, PayrollEntry, UpdateInvoiceInput, UpdatePaymentInput,
    UpdatePayrollInput,
};

use crate::error::{ClientError, ClientResult};
use crate::query::minutes;
use crate::services::resource::{Resource, ResourceService};

pub struct Invoices;

impl Resource for Invoices {
    const NAME: &'static str = "invoices";
    const PATH: &'static str = "/invoices";
    const STALE_TIME: Duration = minutes(5);

    type Item = Invoice;
    type Filter = InvoiceFilter;
    type Create = CreateInvoiceInput;
    type Update = UpdateInvoiceInput;

    fn validate_create(input: &CreateInvoiceInput) -> ClientResult<()> {
        validate_entity_id(&input.patient_id)
            .map_err(|m| ClientError::validation("patient_id", m))?;
        if input.items.is_empty() {
            return Err(ClientError::validation("items", "Invoice needs at least one line"));
        }
        if input
            .items
            .iter()
            .any(|line| line.quantity <= Decimal::ZERO || line.unit_price < Decimal::ZERO)
        {
            return Err(ClientError::validation(
                "items",
                "Line quantities must be positive and prices non-negative",
            ));
        }
        Ok(())
    }

    fn related_scopes() -> &'static [&'static str] {
        &["dashboard"]
    }
}

pub type InvoiceService = ResourceService<Invoices>;

pub struct Payments;

impl Resource for Payments {
    const NAME: &'static str = "payments";
    const PATH: &'static str = "/payments";
    const STALE_TIME: Duration = minutes(5);

    type Item = Payment;
    type Filter = ListParams;
    type Create = CreatePaymentInput;
    type Update = UpdatePaymentInput;

    fn validate_create(input: &CreatePaymentInput) -> ClientResult<()> {
        validate_entity_id(&input.invoice_id)
            .map_err(|m| ClientError::validation("invoice_id", m))?;
        if input.amount <= Decimal::ZERO {
            return Err(ClientError::validation("amount", "Amount must be positive"));
        }
        Ok(())
    }

    // A payment changes the paid amount of its invoice
    fn related_scopes() -> &'static [&'static str] {
        &["invoices", "dashboard"]
    }
}

pub type PaymentService = ResourceService<Payments>;

pub struct Payroll;

impl Resource for Payroll {
    const NAME: &'static str = "payroll";
    const PATH: &'static str = "/payroll";
    const STALE_TIME: Duration = minutes(10);

    type Item = PayrollEntry;
    type Filter = ListParams;
    type Create = CreatePayrollInput;
    type Update = UpdatePayrollInput;

    fn validate_create(input: &CreatePayrollInput) -> ClientResult<()> {
        validate_entity_id(&input.employee_id)
            .map_err(|m| ClientError::validation("employee_id", m))?;
        if input.period_end < input.period_start {
            return Err(ClientError::validation(
                "period_end",
                "Period end must not be before period start",
            ));
        }
        Ok(())
    }
}

pub type PayrollService = ResourceService<Payroll>;
