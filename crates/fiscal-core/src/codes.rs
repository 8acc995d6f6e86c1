//! # Regulatory Code Maps
//!
//! Lookup tables from the numeric codes defined by AFIP regulation to what a
//! fiscal printer driver understands.
//!
//! ## Two Kinds of Tables
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Code Translation                                 │
//! │                                                                         │
//! │  FIXED (regulation only)            DRIVER-SPECIFIC (built at connect)  │
//! │  ───────────────────────            ──────────────────────────────────  │
//! │  document kind 1  → Invoice(A)      tax category 1 → TaxCategory::     │
//! │  document kind 83 → Ticket(None)      ResponsableInscripto → "I"        │
//! │                                     identity doc 80 → Cuit → "C"        │
//! │                                                                         │
//! │  numeric code ──► regulatory symbol ──► driver.tax_category(symbol)     │
//! │                                         driver.identity_doc(symbol)     │
//! │                                                                         │
//! │  A code with no driver constant is left out of the CodeMapping and      │
//! │  fails with UnknownCode. Nothing ever defaults.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::driver::FiscalDriver;
use crate::error::{FiscalError, FiscalResult};
use crate::types::{DocumentClass, DriverConstant, Letter};

// =============================================================================
// Code Kinds
// =============================================================================

/// Which table a code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeKind {
    /// Document type (tipo_cbte).
    DocumentKind,
    /// Buyer tax category (tipo_responsable).
    TaxCategory,
    /// Buyer identity document type (tipo_doc).
    IdentityDoc,
}

impl fmt::Display for CodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeKind::DocumentKind => write!(f, "document kind"),
            CodeKind::TaxCategory => write!(f, "tax category"),
            CodeKind::IdentityDoc => write!(f, "identity document"),
        }
    }
}

/// A regulatory code with its human label and what it stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegulatoryCode<T: 'static> {
    pub code: i64,
    pub label: &'static str,
    pub target: T,
}

// =============================================================================
// Regulatory Symbols
// =============================================================================

/// Buyer tax category as defined by RG 1785/04.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxCategory {
    ResponsableInscripto,
    ResponsableNoInscripto,
    NoResponsable,
    Exento,
    ConsumidorFinal,
    ResponsableMonotributo,
    NoCategorizado,
    PequenioContribuyenteEventual,
    MonotributistaSocial,
    PequenioContribuyenteEventualSocial,
}

/// Buyer identity document kind as defined by RG 1361.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityDocKind {
    Dni,
    Cuit,
    LibretaEnrolamiento,
    LibretaCivica,
    Cedula,
    Pasaporte,
    SinCalificador,
}

// =============================================================================
// Tables
// =============================================================================

/// Document kinds accepted by the controller.
pub const DOCUMENT_KINDS: &[RegulatoryCode<DocumentClass>] = &[
    RegulatoryCode { code: 1, label: "Factura A", target: DocumentClass::Invoice(Letter::A) },
    RegulatoryCode { code: 2, label: "Nota de Débito A", target: DocumentClass::DebitNote(Letter::A) },
    RegulatoryCode { code: 3, label: "Nota de Crédito A", target: DocumentClass::CreditNote(Letter::A) },
    RegulatoryCode { code: 6, label: "Factura B", target: DocumentClass::Invoice(Letter::B) },
    RegulatoryCode { code: 7, label: "Nota de Débito B", target: DocumentClass::DebitNote(Letter::B) },
    RegulatoryCode { code: 8, label: "Nota de Crédito B", target: DocumentClass::CreditNote(Letter::B) },
    RegulatoryCode { code: 11, label: "Factura C", target: DocumentClass::Invoice(Letter::C) },
    RegulatoryCode { code: 12, label: "Nota de Débito C", target: DocumentClass::DebitNote(Letter::C) },
    RegulatoryCode { code: 13, label: "Nota de Crédito C", target: DocumentClass::CreditNote(Letter::C) },
    RegulatoryCode { code: 81, label: "Tique Factura A", target: DocumentClass::Invoice(Letter::A) },
    RegulatoryCode { code: 82, label: "Tique Factura B", target: DocumentClass::Invoice(Letter::B) },
    RegulatoryCode { code: 83, label: "Tique", target: DocumentClass::Ticket(None) },
];

/// Buyer tax categories (RG 1785/04).
pub const TAX_CATEGORIES: &[RegulatoryCode<TaxCategory>] = &[
    RegulatoryCode { code: 1, label: "IVA Responsable Inscripto", target: TaxCategory::ResponsableInscripto },
    RegulatoryCode { code: 2, label: "IVA Responsable no Inscripto", target: TaxCategory::ResponsableNoInscripto },
    RegulatoryCode { code: 3, label: "IVA no Responsable", target: TaxCategory::NoResponsable },
    RegulatoryCode { code: 4, label: "IVA Sujeto Exento", target: TaxCategory::Exento },
    RegulatoryCode { code: 5, label: "Consumidor Final", target: TaxCategory::ConsumidorFinal },
    RegulatoryCode { code: 6, label: "Responsable Monotributo", target: TaxCategory::ResponsableMonotributo },
    RegulatoryCode { code: 7, label: "Sujeto no Categorizado", target: TaxCategory::NoCategorizado },
    RegulatoryCode { code: 12, label: "Pequeño Contribuyente Eventual", target: TaxCategory::PequenioContribuyenteEventual },
    RegulatoryCode { code: 13, label: "Monotributista Social", target: TaxCategory::MonotributistaSocial },
    RegulatoryCode { code: 14, label: "Pequeño Contribuyente Eventual Social", target: TaxCategory::PequenioContribuyenteEventualSocial },
];

/// Buyer identity document kinds (RG 1361).
pub const IDENTITY_DOCS: &[RegulatoryCode<IdentityDocKind>] = &[
    RegulatoryCode { code: 80, label: "CUIT", target: IdentityDocKind::Cuit },
    RegulatoryCode { code: 89, label: "Libreta de Enrolamiento", target: IdentityDocKind::LibretaEnrolamiento },
    RegulatoryCode { code: 90, label: "Libreta Cívica", target: IdentityDocKind::LibretaCivica },
    RegulatoryCode { code: 0, label: "Cédula", target: IdentityDocKind::Cedula },
    RegulatoryCode { code: 94, label: "Pasaporte", target: IdentityDocKind::Pasaporte },
    RegulatoryCode { code: 96, label: "DNI", target: IdentityDocKind::Dni },
    RegulatoryCode { code: 99, label: "Sin Calificador", target: IdentityDocKind::SinCalificador },
];

fn find<T: Copy>(table: &[RegulatoryCode<T>], code: i64) -> Option<&RegulatoryCode<T>> {
    table.iter().find(|entry| entry.code == code)
}

/// Resolves a document kind code to its family and letter.
///
/// ## Example
/// ```rust
/// use fiscal_core::codes::document_class;
/// use fiscal_core::{DocumentClass, Letter};
///
/// assert_eq!(document_class(6).unwrap(), DocumentClass::Invoice(Letter::B));
/// assert_eq!(document_class(83).unwrap().letter(), None); // no letter, not an error
/// assert!(document_class(4).is_err());
/// ```
pub fn document_class(code: i64) -> FiscalResult<DocumentClass> {
    find(DOCUMENT_KINDS, code)
        .map(|entry| entry.target)
        .ok_or(FiscalError::UnknownCode {
            kind: CodeKind::DocumentKind,
            code,
        })
}

/// Human label of a code, for logs and diagnostics.
pub fn label(kind: CodeKind, code: i64) -> Option<&'static str> {
    match kind {
        CodeKind::DocumentKind => find(DOCUMENT_KINDS, code).map(|e| e.label),
        CodeKind::TaxCategory => find(TAX_CATEGORIES, code).map(|e| e.label),
        CodeKind::IdentityDoc => find(IDENTITY_DOCS, code).map(|e| e.label),
    }
}

// =============================================================================
// Code Mapping
// =============================================================================

/// Driver-specific translation of tax category and identity document codes.
///
/// Built once per connected driver; document kinds go through the fixed
/// [`document_class`] table instead.
#[derive(Debug, Clone, Default)]
pub struct CodeMapping {
    tax_categories: HashMap<i64, DriverConstant>,
    identity_docs: HashMap<i64, DriverConstant>,
}

impl CodeMapping {
    /// Builds the mapping from the driver's own enumerations.
    ///
    /// Regulatory codes the driver has no constant for are left out, so
    /// looking them up later fails instead of guessing.
    pub fn build(driver: &dyn FiscalDriver) -> Self {
        let tax_categories = TAX_CATEGORIES
            .iter()
            .filter_map(|entry| {
                driver
                    .tax_category(entry.target)
                    .map(|constant| (entry.code, constant))
            })
            .collect();

        let identity_docs = IDENTITY_DOCS
            .iter()
            .filter_map(|entry| {
                driver
                    .identity_doc(entry.target)
                    .map(|constant| (entry.code, constant))
            })
            .collect();

        CodeMapping {
            tax_categories,
            identity_docs,
        }
    }

    /// Driver constant for a buyer tax category code.
    pub fn tax_category(&self, code: i64) -> FiscalResult<&DriverConstant> {
        self.tax_categories
            .get(&code)
            .ok_or(FiscalError::UnknownCode {
                kind: CodeKind::TaxCategory,
                code,
            })
    }

    /// Driver constant for an identity document code.
    pub fn identity_doc(&self, code: i64) -> FiscalResult<&DriverConstant> {
        self.identity_docs
            .get(&code)
            .ok_or(FiscalError::UnknownCode {
                kind: CodeKind::IdentityDoc,
                code,
            })
    }

    /// Number of (tax category, identity document) codes this driver covers.
    pub fn coverage(&self) -> (usize, usize) {
        (self.tax_categories.len(), self.identity_docs.len())
    }
}
