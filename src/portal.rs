//! Portal Page Definitions
//!
//! The tax authority exposes two lookup pages: one for enterprises
//! (queried by MST) and one for individuals (queried by MST or CCCD).
//! Each page has its own form field names, captcha image location and
//! error paragraph location.

use anyhow::{bail, Result};
use serde::Deserialize;

/// Error paragraph text shown when the captcha answer was wrong.
pub const WRONG_CAPTCHA_MESSAGE: &str = "Vui lòng nhập đúng mã xác nhận!";

/// Cell text shown in the result table when a code matches nothing.
pub const NO_RESULT_MESSAGE: &str = "Không tìm thấy kết quả.";

/// Which lookup page to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortalKind {
    Enterprise,
    Personal,
}

/// Which identity code the query uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryField {
    Mst,
    Cccd,
}

impl PortalKind {
    pub fn url(&self) -> &'static str {
        match self {
            PortalKind::Enterprise => "https://tracuunnt.gdt.gov.vn/tcnnt/mstdn.jsp",
            PortalKind::Personal => "https://tracuunnt.gdt.gov.vn/tcnnt/mstcn.jsp",
        }
    }

    /// Name attribute of the form input the code is typed into.
    pub fn form_field(&self, query: QueryField) -> Result<&'static str> {
        match (self, query) {
            (PortalKind::Enterprise, QueryField::Mst) => Ok("mst"),
            (PortalKind::Enterprise, QueryField::Cccd) => {
                bail!("the enterprise portal has no CCCD field")
            }
            (PortalKind::Personal, QueryField::Mst) => Ok("mst1"),
            (PortalKind::Personal, QueryField::Cccd) => Ok("cmt2"),
        }
    }

    /// XPath of the captcha image element.
    pub fn captcha_xpath(&self) -> &'static str {
        match self {
            PortalKind::Enterprise => {
                "//*[@id=\"tcmst\"]/form/table/tbody/tr[6]/td[2]/table/tbody/tr/td[2]/div/img"
            }
            PortalKind::Personal => {
                "//*[@id=\"module3Content\"]/div/form/table/tbody/tr[6]/td[2]/table/tbody/tr/td[2]/div/img"
            }
        }
    }

    /// XPath of the paragraph the portal renders validation errors into.
    pub fn error_xpath(&self) -> &'static str {
        match self {
            PortalKind::Enterprise => {
                "/html/body/div/div[1]/div[4]/div[2]/div[2]/div/div/div/p"
            }
            PortalKind::Personal => "//*[@id=\"module3Content\"]/div/p",
        }
    }

    /// Header of the result table column carrying the queried code.
    pub fn code_column(&self) -> &'static str {
        match self {
            PortalKind::Enterprise => "MST",
            PortalKind::Personal => "Số CMT/Thẻ căn cước",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PortalKind::Enterprise => "enterprise",
            PortalKind::Personal => "personal",
        }
    }
}
