//! Row-level normalization: one portal JSON object in, one canonical
//! record out.
//!
//! Field names vary per deployment; each canonical field probes an
//! ordered synonym list and the first non-null hit wins. The tables are
//! data, not code, so supporting a new deployment is an append here and
//! nowhere else.

use serde_json::Value;

use crate::model::{CanonicalRecord, CourseStatus};
use crate::normalize::shapes::pick;
use crate::normalize::values;

const CODE_KEYS: &[&str] = &["CodDisciplina", "CodigoDisciplina", "Codigo", "codigo", "Cod"];
const NAME_KEYS: &[&str] = &["NomeDisciplina", "Disciplina", "Nome", "nome", "Descricao"];
const GRADE_A_KEYS: &[&str] = &["NotaEtapa1", "Nota1", "NotaA", "Etapa1"];
const GRADE_B_KEYS: &[&str] = &["NotaEtapa2", "Nota2", "NotaB", "Etapa2"];
const FINAL_GRADE_KEYS: &[&str] = &["NotaFinal", "MediaFinal", "Media", "Nota", "Resultado"];
const ABSENCE_KEYS: &[&str] = &["Faltas", "NumFaltas", "TotalFaltas", "FaltasTotal"];
const STATUS_KEYS: &[&str] = &["Situacao", "SituacaoDisciplina", "Status", "situacao"];
const TERM_TAKEN_KEYS: &[&str] = &["PeriodoLetivo", "AnoSemestre", "Semestre"];
const CREDIT_KEYS: &[&str] = &["Creditos", "QtdCreditos", "NumCreditos"];
const HOURS_KEYS: &[&str] = &["CargaHoraria", "CH", "CHTotal", "CargaHorariaTotal"];
const TERM_KEYS: &[&str] = &["Periodo", "Serie", "PeriodoIdeal"];
const KIND_KEYS: &[&str] = &["SubGrupo", "Grupo", "TipoDisciplina", "Natureza"];

/// Normalize a grade-bearing row (current term listing or transcript).
///
/// Rows with neither a course code nor a name are headers or aggregate
/// footers the portal mixes into its listings; they yield `None`.
pub fn grade_row(item: &Value) -> Option<CanonicalRecord> {
    let code = values::text(pick(item, CODE_KEYS));
    let name = values::text(pick(item, NAME_KEYS));
    if code.is_none() && name.is_none() {
        return None;
    }
    Some(CanonicalRecord {
        code: code.unwrap_or_default(),
        name: name.unwrap_or_default(),
        grade_a: values::parse_grade(pick(item, GRADE_A_KEYS)),
        grade_b: values::parse_grade(pick(item, GRADE_B_KEYS)),
        final_grade: values::parse_grade(pick(item, FINAL_GRADE_KEYS)),
        absences: values::parse_count(pick(item, ABSENCE_KEYS)),
        status: values::map_status(pick(item, STATUS_KEYS)),
        term_taken: values::text(pick(item, TERM_TAKEN_KEYS)),
        credits: values::parse_count(pick(item, CREDIT_KEYS)),
        contact_hours: values::parse_count(pick(item, HOURS_KEYS)),
        term: values::parse_term(pick(item, TERM_KEYS)),
        kind: values::classify_kind(pick(item, KIND_KEYS)),
    })
}

/// Normalize a curriculum matrix row.
///
/// Curriculum output never carries grades. Status comes from the row's
/// label when one exists; a row with a numeric grade but no label falls
/// back to the passing threshold; a row with neither is not started.
pub fn curriculum_row(item: &Value, min_passing_grade: f64) -> Option<CanonicalRecord> {
    let code = values::text(pick(item, CODE_KEYS));
    let name = values::text(pick(item, NAME_KEYS));
    if code.is_none() && name.is_none() {
        return None;
    }

    let status_field = pick(item, STATUS_KEYS);
    let status = if values::text(status_field).is_some() {
        values::map_status(status_field)
    } else if let Some(grade) = values::parse_grade(pick(item, FINAL_GRADE_KEYS)) {
        if grade >= min_passing_grade {
            CourseStatus::Passed
        } else {
            CourseStatus::Failed
        }
    } else {
        CourseStatus::NotStarted
    };

    Some(CanonicalRecord {
        code: code.unwrap_or_default(),
        name: name.unwrap_or_default(),
        grade_a: None,
        grade_b: None,
        final_grade: None,
        absences: 0,
        status,
        term_taken: None,
        credits: values::parse_count(pick(item, CREDIT_KEYS)),
        contact_hours: values::parse_count(pick(item, HOURS_KEYS)),
        term: values::parse_term(pick(item, TERM_KEYS)),
        kind: values::classify_kind(pick(item, KIND_KEYS)),
    })
}
