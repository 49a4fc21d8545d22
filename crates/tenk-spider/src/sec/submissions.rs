use super::Filing;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::error;

// Submission histories come back as parallel arrays under
// `filings.recent`, one index per filing:
//
// {
//     "filings": {
//         "recent": {
//             "form":            [ "10-Q", "10-K", ... ],
//             "accessionNumber": [ "0000320193-24-000123", ... ],
//             "primaryDocument": [ "aapl-20240928.htm", ... ],
//             "filingDate":      [ "2024-11-01", ... ]
//         }
//     }
// }

#[derive(Debug, Deserialize)]
pub(super) struct Submissions {
    #[serde(default)]
    pub(super) filings: Filings,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct Filings {
    #[serde(default)]
    pub(super) recent: Recent,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Recent {
    #[serde(default)]
    form: Vec<String>,
    #[serde(default)]
    accession_number: Vec<String>,
    #[serde(default)]
    primary_document: Vec<String>,
    #[serde(default)]
    filing_date: Vec<String>,
}

impl Recent {
    /// First `10-K` row wins. EDGAR serves `recent` in reverse-chronological
    /// order, so that row is the latest filing; the order is trusted as an
    /// external contract, not re-sorted by date here.
    pub(super) fn latest_10k(&self, cik: &str) -> Option<Filing> {
        for (i, form) in self.form.iter().enumerate() {
            if form != "10-K" {
                continue;
            }

            let accession = self.accession_number.get(i)?;
            let primary_doc = self.primary_document.get(i)?;
            let date = self.filing_date.get(i)?;

            let filing_date = match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
                Ok(date) => date,
                Err(err) => {
                    error!("unparseable filing date {date:?} for CIK {cik}, error({err})");
                    return None;
                }
            };

            return Some(Filing {
                cik: cik.to_string(),
                filing_date,
                url: document_url(cik, accession, primary_doc)?,
            });
        }

        None
    }
}

/// Archive path convention: CIK without its zero padding, accession number
/// without hyphens.
fn document_url(cik: &str, accession: &str, primary_doc: &str) -> Option<String> {
    let cik = match cik.parse::<u64>() {
        Ok(cik) => cik,
        Err(err) => {
            error!("non-numeric CIK {cik:?}, error({err})");
            return None;
        }
    };
    let accession = accession.replace('-', "");

    Some(format!(
        "https://www.sec.gov/Archives/edgar/data/{cik}/{accession}/{primary_doc}"
    ))
}
