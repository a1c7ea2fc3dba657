//! Manual transaction import from CSV.
//!
//! Columns: `external_id, type, from_account, from_currency, from_amount,
//! to_account, to_currency, to_amount, usd_value, fee, transacted_at`.
//! `type` and `fee` may be omitted. `transacted_at` is RFC 3339 or epoch
//! milliseconds.

use crate::domain::{Account, Currency, Decimal, NewTransaction, TimeMs, TransactionType};
use std::io::Read;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CsvImportError {
    #[error("CSV error on line {line}: {message}")]
    Csv { line: u64, message: String },
    #[error("invalid {field} on line {line}: {message}")]
    InvalidField {
        line: u64,
        field: &'static str,
        message: String,
    },
}

#[derive(Debug, serde::Deserialize)]
struct Row {
    external_id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    from_account: String,
    from_currency: String,
    from_amount: String,
    to_account: String,
    to_currency: String,
    to_amount: String,
    usd_value: String,
    fee: Option<String>,
    transacted_at: String,
}

/// Parse every row of a transaction CSV. Fails on the first invalid row.
pub fn parse_transactions_csv<R: Read>(input: R) -> Result<Vec<NewTransaction>, CsvImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let csv_error = |e: csv::Error| CsvImportError::Csv {
        line: e.position().map(|p| p.line()).unwrap_or(0),
        message: e.to_string(),
    };

    let headers = reader.headers().map_err(csv_error)?.clone();
    let mut record = csv::StringRecord::new();
    let mut transactions = Vec::new();
    while reader.read_record(&mut record).map_err(csv_error)? {
        // Line the record starts on; quoted fields may span several.
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row: Row = record
            .deserialize(Some(&headers))
            .map_err(|e| CsvImportError::Csv {
                line,
                message: e.to_string(),
            })?;
        transactions.push(convert_row(row, line)?);
    }

    Ok(transactions)
}

fn convert_row(row: Row, line: u64) -> Result<NewTransaction, CsvImportError> {
    let decimal = |field: &'static str, value: &str| {
        Decimal::from_str_canonical(value).map_err(|e| CsvImportError::InvalidField {
            line,
            field,
            message: e.to_string(),
        })
    };

    let from_account = Account::named(row.from_account);
    let to_account = Account::named(row.to_account);

    let kind = match row.kind.as_deref().filter(|k| !k.is_empty()) {
        Some(k) => k
            .parse::<TransactionType>()
            .map_err(|message| CsvImportError::InvalidField {
                line,
                field: "type",
                message,
            })?,
        None if from_account.is_external() || to_account.is_external() => {
            TransactionType::Transfer
        }
        None => TransactionType::Trade,
    };

    let fee = match row.fee.as_deref().filter(|f| !f.is_empty()) {
        Some(f) => decimal("fee", f)?,
        None => Decimal::zero(),
    };

    Ok(NewTransaction {
        kind,
        external_id: row.external_id.filter(|id| !id.is_empty()),
        from_account,
        from_currency: Currency::new(row.from_currency),
        from_amount: decimal("from_amount", &row.from_amount)?,
        to_account,
        to_currency: Currency::new(row.to_currency),
        to_amount: decimal("to_amount", &row.to_amount)?,
        usd_value: decimal("usd_value", &row.usd_value)?,
        fee,
        transacted_at: parse_time(&row.transacted_at).ok_or_else(|| {
            CsvImportError::InvalidField {
                line,
                field: "transacted_at",
                message: format!("unrecognized timestamp: {}", row.transacted_at),
            }
        })?,
    })
}

fn parse_time(value: &str) -> Option<TimeMs> {
    value
        .parse::<i64>()
        .ok()
        .map(TimeMs::new)
        .or_else(|| TimeMs::parse_rfc3339(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "external_id,type,from_account,from_currency,from_amount,to_account,to_currency,to_amount,usd_value,fee,transacted_at\n";

    #[test]
    fn test_parse_trade_row() {
        let csv = format!(
            "{}cb-1,trade,Coinbase,USD,3700.00,Coinbase,BTC,1,3700.00,1.99,2019-01-19T13:59:12.562Z\n",
            HEADER
        );
        let txns = parse_transactions_csv(csv.as_bytes()).unwrap();
        assert_eq!(txns.len(), 1);
        let t = &txns[0];
        assert_eq!(t.kind, TransactionType::Trade);
        assert_eq!(t.external_id.as_deref(), Some("cb-1"));
        assert_eq!(t.from_currency, Currency::new("USD"));
        assert_eq!(t.to_amount, Decimal::from(1));
        assert_eq!(t.fee.to_canonical_string(), "1.99");
        assert_eq!(t.transacted_at, TimeMs::new(1_547_906_352_562));
    }

    #[test]
    fn test_missing_type_and_fee_are_inferred() {
        let csv = "external_id,from_account,from_currency,from_amount,to_account,to_currency,to_amount,usd_value,transacted_at\n\
                   ,External,BTC,0.5,Coinbase,BTC,0.5,2000,1546300800000\n";
        let txns = parse_transactions_csv(csv.as_bytes()).unwrap();
        assert_eq!(txns[0].kind, TransactionType::Transfer);
        assert_eq!(txns[0].fee, Decimal::zero());
        assert_eq!(txns[0].external_id, None);
        assert_eq!(txns[0].from_account, Account::External);
        assert_eq!(txns[0].transacted_at, TimeMs::new(1_546_300_800_000));
    }

    #[test]
    fn test_invalid_amount_reports_line() {
        let csv = format!(
            "{}a,trade,Coinbase,USD,10,Coinbase,BTC,1,10,0,1000\nb,trade,Coinbase,USD,ten,Coinbase,BTC,1,10,0,2000\n",
            HEADER
        );
        let err = parse_transactions_csv(csv.as_bytes()).unwrap_err();
        match err {
            CsvImportError::InvalidField { line, field, .. } => {
                assert_eq!(line, 3);
                assert_eq!(field, "from_amount");
            }
            other => panic!("Expected InvalidField, got {:?}", other),
        }
    }

    #[test]
    fn test_multiline_quoted_field_keeps_line_numbers() {
        // The first row's external_id spans lines 2 and 3.
        let csv = format!(
            "{}\"note\nsplit\",trade,Coinbase,USD,10,Coinbase,BTC,1,10,0,1000\nb,trade,Coinbase,USD,ten,Coinbase,BTC,1,10,0,2000\n",
            HEADER
        );
        match parse_transactions_csv(csv.as_bytes()).unwrap_err() {
            CsvImportError::InvalidField { line, field, .. } => {
                assert_eq!(line, 4);
                assert_eq!(field, "from_amount");
            }
            other => panic!("Expected InvalidField, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_timestamp() {
        let csv = format!(
            "{}a,trade,Coinbase,USD,10,Coinbase,BTC,1,10,0,yesterday\n",
            HEADER
        );
        assert!(matches!(
            parse_transactions_csv(csv.as_bytes()),
            Err(CsvImportError::InvalidField {
                field: "transacted_at",
                ..
            })
        ));
    }
}
