//! Golden output tests for translated criteria and libraries

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sq2cql::{
    assemble, AttributeFilter, AttributeMapping, Comparator, Container, ContextualConcept,
    ContextualTermCode, Criterion, Error, Expression, FixedCriterion, Library, LibraryHeader,
    Mapping, MappingContext, PathMapping, Print, PrintContext, Quantity, StructuredQuery,
    TermCode, TermCodeNode, TimeRestriction, Translator, ValueType,
};

const HEADER: &str = "library Retrieve version '1.0.0'\nusing FHIR version '4.0.0'\ninclude FHIRHelpers version '4.0.0'\n";

const ICD10: &str = "http://fhir.de/CodeSystem/bfarm/icd-10-gm";
const LOINC: &str = "http://loinc.org";
const SNOMED: &str = "http://snomed.info/sct";
const ATC: &str = "http://fhir.de/CodeSystem/bfarm/atc";

fn context_code(code: &str) -> TermCode {
    TermCode::new("fdpg.mii.cds", code, code)
}

fn key(context: &str, system: &str, code: &str) -> ContextualTermCode {
    ContextualTermCode::new(context_code(context), TermCode::new(system, code, ""))
}

fn concept(context: &str, system: &str, codes: &[&str]) -> ContextualConcept {
    ContextualConcept::new(
        context_code(context),
        codes.iter().map(|c| TermCode::new(system, *c, "")).collect(),
    )
    .unwrap()
}

fn quantity(value: i64, unit: &str) -> Quantity {
    Quantity::new(Decimal::from(value), Some(unit.to_string()))
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn mapping_context(mappings: Vec<Mapping>) -> MappingContext {
    MappingContext::builder()
        .mappings(mappings)
        .code_system_alias(ICD10, "icd10")
        .code_system_alias(LOINC, "loinc")
        .code_system_alias(SNOMED, "snomed")
        .code_system_alias(ATC, "atc")
        .build()
}

fn translate(context: MappingContext, inclusion: Vec<Vec<Criterion>>) -> Library {
    let query = StructuredQuery::new(inclusion, vec![]).unwrap();
    Translator::new(context).to_cql(&query).unwrap()
}

/// Body of the first Patient-context definition, printed at top level.
fn first_body(library: &Library) -> String {
    library.patient_definitions()[0]
        .expression
        .print(PrintContext::ZERO)
}

fn diagnosis_mapping(code: &str) -> Mapping {
    Mapping::new(key("Diagnose", ICD10, code), "Condition")
}

fn laboratory_mapping(code: &str) -> Mapping {
    Mapping::new(key("Laboratory", LOINC, code), "Observation")
        .with_value(PathMapping::single("value", ValueType::Quantity))
}

#[test]
fn concept_criterion() {
    let context = mapping_context(vec![Mapping::new(key("Laboratory", ICD10, "C71"), "Observation")]);
    let library = translate(
        context,
        vec![vec![Criterion::concept(concept("Laboratory", ICD10, &["C71"]))]],
    );

    assert_eq!(first_body(&library), "exists([Observation: Code 'C71' from icd10])");
    assert_eq!(
        library.print(),
        format!(
            "{HEADER}
codesystem icd10: 'http://fhir.de/CodeSystem/bfarm/icd-10-gm'

context Patient

define Criterion:
  exists([Observation: Code 'C71' from icd10])

define InInitialPopulation:
  Criterion
"
        )
    );
}

#[test]
fn numeric_criterion() {
    let context = mapping_context(vec![laboratory_mapping("26515-7")]);
    let criterion = Criterion::numeric(
        concept("Laboratory", LOINC, &["26515-7"]),
        Comparator::Less,
        quantity(50, "g/dl"),
    );
    let library = translate(context, vec![vec![criterion]]);

    assert_eq!(
        first_body(&library),
        "exists(from [Observation: Code '26515-7' from loinc] O\n  where O.value as Quantity < 50 'g/dl')"
    );
}

#[test]
fn range_criterion() {
    let context = mapping_context(vec![laboratory_mapping("718-7")]);
    let criterion = Criterion::range(
        concept("Laboratory", LOINC, &["718-7"]),
        quantity(20, "g/dl"),
        quantity(30, "g/dl"),
    )
    .unwrap();
    let library = translate(context, vec![vec![criterion]]);

    assert_eq!(
        first_body(&library),
        "exists(from [Observation: Code '718-7' from loinc] O\n  where O.value as Quantity between 20 'g/dl' and 30 'g/dl')"
    );
}

#[test]
fn inclusion_and_exclusion() {
    let library = assemble(
        vec![vec![Container::of(Expression::TRUE)]],
        vec![vec![Container::of(Expression::TRUE), Container::of(Expression::FALSE)]],
        LibraryHeader::default(),
    );

    assert_eq!(
        library.print(),
        format!(
            "{HEADER}
context Patient

define Inclusion:
  true

define Exclusion:
  (true) and
  (false)

define InInitialPopulation:
  Inclusion and
  not Exclusion
"
        )
    );
}

#[test]
fn value_set_criterion_via_coding() {
    let context = mapping_context(vec![Mapping::new(key("Laboratory", LOINC, "94500-6"), "Observation")
        .with_value(PathMapping::single("value", ValueType::Coding))]);
    let criterion = Criterion::value_set(
        concept("Laboratory", LOINC, &["94500-6"]),
        vec![TermCode::new(SNOMED, "260373001", "Detected"), TermCode::new(SNOMED, "260415000", "Not detected")],
    )
    .unwrap();
    let library = translate(context, vec![vec![criterion]]);

    assert_eq!(
        first_body(&library),
        "exists(from [Observation: Code '94500-6' from loinc] O
  where O.value contains Code '260373001' from snomed or
    O.value contains Code '260415000' from snomed)"
    );
    let aliases: Vec<&str> = library.code_systems().iter().map(|cs| cs.alias.as_str()).collect();
    assert_eq!(aliases, vec!["loinc", "snomed"]);
}

#[test]
fn value_set_criterion_via_codeable_concept() {
    let context = mapping_context(vec![Mapping::new(key("Laboratory", LOINC, "94500-6"), "Observation")
        .with_value(PathMapping::single("value", ValueType::CodeableConcept))]);
    let criterion = Criterion::value_set(
        concept("Laboratory", LOINC, &["94500-6"]),
        vec![TermCode::new(SNOMED, "260373001", "Detected")],
    )
    .unwrap();

    assert_eq!(
        first_body(&translate(context, vec![vec![criterion]])),
        "exists(from [Observation: Code '94500-6' from loinc] O
  where O.value.coding contains Code '260373001' from snomed)"
    );
}

#[test]
fn patient_gender() {
    let context = mapping_context(vec![Mapping::new(key("Patient", LOINC, "76689-9"), "Patient")
        .with_value(PathMapping::single("gender", ValueType::Code))]);
    let criterion = Criterion::value_set(
        concept("Patient", LOINC, &["76689-9"]),
        vec![TermCode::new("http://hl7.org/fhir/administrative-gender", "male", "Male")],
    )
    .unwrap();

    assert_eq!(
        first_body(&translate(context, vec![vec![criterion]])),
        "Patient.gender = 'male'"
    );
}

#[test]
fn patient_without_constraints_is_true() {
    let context = mapping_context(vec![Mapping::new(key("Patient", LOINC, "76689-9"), "Patient")]);
    let criterion = Criterion::concept(concept("Patient", LOINC, &["76689-9"]));

    assert_eq!(first_body(&translate(context, vec![vec![criterion]])), "true");
}

#[test]
fn age_criterion() {
    let context = mapping_context(vec![Mapping::new(key("Patient", SNOMED, "424144002"), "Patient")]);
    let criterion = Criterion::numeric(
        concept("Patient", SNOMED, &["424144002"]),
        Comparator::GreaterOrEqual,
        quantity(18, "a"),
    );
    assert_eq!(
        first_body(&translate(context.clone(), vec![vec![criterion]])),
        "AgeInYears() >= 18"
    );

    let criterion = Criterion::range(
        concept("Patient", SNOMED, &["424144002"]),
        quantity(6, "mo"),
        quantity(12, "mo"),
    )
    .unwrap();
    assert_eq!(
        first_body(&translate(context, vec![vec![criterion]])),
        "AgeInMonths() between 6 and 12"
    );
}

#[test]
fn age_with_unknown_unit_fails() {
    let context = mapping_context(vec![Mapping::new(key("Patient", SNOMED, "424144002"), "Patient")]);
    let criterion = Criterion::numeric(
        concept("Patient", SNOMED, &["424144002"]),
        Comparator::Greater,
        quantity(18, "cm"),
    );
    let query = StructuredQuery::new(vec![vec![criterion]], vec![]).unwrap();
    assert!(matches!(
        Translator::new(context).to_cql(&query),
        Err(Error::MalformedInput(_))
    ));
}

#[test]
fn medication_administration() {
    let context = mapping_context(vec![Mapping::new(
        key("Medikamentenverabreichung", ATC, "B01AB01"),
        "MedicationAdministration",
    )]);
    let criterion = Criterion::concept(concept("Medikamentenverabreichung", ATC, &["B01AB01"]));

    assert_eq!(
        translate(context, vec![vec![criterion]]).print(),
        format!(
            "{HEADER}
codesystem atc: 'http://fhir.de/CodeSystem/bfarm/atc'

context Unfiltered

define Medication_atc_B01AB01:
  from [Medication: Code 'B01AB01' from atc] M
    return 'Medication/' + M.id

context Patient

define Criterion:
  exists(from [MedicationAdministration] M
    where M.medication.reference in Medication_atc_B01AB01)

define InInitialPopulation:
  Criterion
"
        )
    );
}

#[test]
fn reference_attribute() {
    let diagnosis = TermCode::new("fdpg.mii.cds", "Diagnose", "Diagnose");
    let context = mapping_context(vec![
        Mapping::new(key("Specimen", SNOMED, "119364003"), "Specimen").with_attribute(AttributeMapping {
            key: diagnosis.clone(),
            path: PathMapping::single("extension.where(url='https://www.medizininformatik-initiative.de/fhir/ext/modul-biobank/StructureDefinition/Diagnose').value", ValueType::Reference),
            reference_target_type: Some("Condition".into()),
        }),
        diagnosis_mapping("C71"),
    ]);
    let criterion = Criterion::concept(concept("Specimen", SNOMED, &["119364003"])).with_attribute_filter(
        AttributeFilter::reference(
            diagnosis,
            vec![Criterion::concept(concept("Diagnose", ICD10, &["C71"]))],
        )
        .unwrap(),
    );

    assert_eq!(
        translate(context, vec![vec![criterion]]).print(),
        format!(
            "{HEADER}
codesystem icd10: 'http://fhir.de/CodeSystem/bfarm/icd-10-gm'
codesystem snomed: 'http://snomed.info/sct'

context Unfiltered

define Diagnose_C71:
  from [Condition: Code 'C71' from icd10] C
    return 'Condition/' + C.id

context Patient

define Criterion:
  exists(from [Specimen: Code '119364003' from snomed] S
    with Diagnose_C71 R
      such that S.extension.where(url='https://www.medizininformatik-initiative.de/fhir/ext/modul-biobank/StructureDefinition/Diagnose').value.reference = R)

define InInitialPopulation:
  Criterion
"
        )
    );
}

#[test]
fn reference_union_over_expanded_codes() {
    let mut context = MappingContext::builder()
        .mappings([
            Mapping::new(key("Specimen", SNOMED, "119364003"), "Specimen")
                .with_value(PathMapping::single("parent", ValueType::Reference)),
            diagnosis_mapping("C71.0"),
            diagnosis_mapping("C71.1"),
        ])
        .tree_nodes([TermCodeNode::new(
            context_code("Diagnose"),
            TermCode::new(ICD10, "C71", ""),
            vec![
                TermCodeNode::leaf(context_code("Diagnose"), TermCode::new(ICD10, "C71.0", "")),
                TermCodeNode::leaf(context_code("Diagnose"), TermCode::new(ICD10, "C71.1", "")),
            ],
        )]);
    context = context.code_system_alias(ICD10, "icd10").code_system_alias(SNOMED, "snomed");

    let criterion = Criterion::reference(
        concept("Specimen", SNOMED, &["119364003"]),
        vec![Criterion::concept(concept("Diagnose", ICD10, &["C71"]))],
    )
    .unwrap();
    let library = translate(context.build(), vec![vec![criterion]]);

    assert_eq!(
        library.unfiltered_definitions()[0].print(PrintContext::ZERO),
        "define Diagnose_C71:
  (from [Condition: Code 'C71.0' from icd10] C
    return 'Condition/' + C.id) union
  (from [Condition: Code 'C71.1' from icd10] C
    return 'Condition/' + C.id)"
    );
    assert_eq!(
        first_body(&library),
        "exists(from [Specimen: Code '119364003' from snomed] S
  with Diagnose_C71 R
    such that S.parent.reference = R)"
    );
}

#[test]
fn time_restriction() {
    let context = mapping_context(vec![diagnosis_mapping("C71")
        .with_time_restriction(PathMapping::single("onset", ValueType::DateTime))]);
    let criterion = Criterion::concept(concept("Diagnose", ICD10, &["C71"]))
        .with_time_restriction(TimeRestriction::new(Some(date(2020, 1, 1)), Some(date(2021, 6, 30))).unwrap());

    assert_eq!(
        first_body(&translate(context, vec![vec![criterion]])),
        "exists(from [Condition: Code 'C71' from icd10] C
  where ToDate(C.onset as dateTime) in Interval[@2020-01-01T, @2021-06-30T])"
    );
}

#[test]
fn time_restriction_on_period() {
    let context = mapping_context(vec![Mapping::new(key("Prozedur", SNOMED, "80146002"), "Procedure")
        .with_time_restriction(PathMapping::single("performed", ValueType::Period))]);
    let criterion = Criterion::concept(concept("Prozedur", SNOMED, &["80146002"]))
        .with_time_restriction(TimeRestriction::new(None, Some(date(2021, 6, 30))).unwrap());

    assert_eq!(
        first_body(&translate(context, vec![vec![criterion]])),
        "exists(from [Procedure: Code '80146002' from snomed] P
  where P.performed as Period overlaps Interval[@1900-01-01T, @2021-06-30T])"
    );
}

#[test]
fn modifiers_are_applied_in_order() {
    let status = |code: &str| TermCode::new("http://hl7.org/fhir/observation-status", code, "");
    let interpretation = TermCode::new("fdpg.mii.cds", "interpretation", "");
    let context = mapping_context(vec![laboratory_mapping("718-7")
        .with_fixed_criterion(FixedCriterion {
            path: PathMapping::single("status", ValueType::Code),
            values: vec![status("final"), status("amended")],
        })
        .with_attribute(AttributeMapping {
            key: interpretation.clone(),
            path: PathMapping::single("interpretation", ValueType::CodeableConcept),
            reference_target_type: None,
        })
        .with_time_restriction(PathMapping::single("effective", ValueType::DateTime))]);

    let criterion = Criterion::numeric(
        concept("Laboratory", LOINC, &["718-7"]),
        Comparator::Less,
        quantity(10, "g/dl"),
    )
    .with_attribute_filter(
        AttributeFilter::concept(interpretation, vec![TermCode::new(SNOMED, "281302008", "Above reference range")])
            .unwrap(),
    )
    .with_time_restriction(TimeRestriction::new(Some(date(2020, 1, 1)), None).unwrap());

    assert_eq!(
        first_body(&translate(context, vec![vec![criterion]])),
        "exists(from [Observation: Code '718-7' from loinc] O
  where O.value as Quantity < 10 'g/dl' and
    (O.status = 'final' or
    O.status = 'amended') and
    O.interpretation.coding contains Code '281302008' from snomed and
    ToDate(O.effective as dateTime) in Interval[@2020-01-01T, @2040-01-01T])"
    );
}

#[test]
fn term_code_path_replaces_retrieve_terminology() {
    let context = mapping_context(vec![Mapping::new(key("Einwilligung", SNOMED, "2.16.840"), "Consent")
        .with_term_code_path(PathMapping::single("provision.provision.code", ValueType::CodeableConcept))]);
    let criterion = Criterion::concept(concept("Einwilligung", SNOMED, &["2.16.840"]));

    assert_eq!(
        first_body(&translate(context, vec![vec![criterion]])),
        "exists(from [Consent] C
  where C.provision.provision.code.coding contains Code '2.16.840' from snomed)"
    );
}

#[test]
fn expanded_codes_are_or_ed() {
    let context = MappingContext::builder()
        .mappings([diagnosis_mapping("C71.0"), diagnosis_mapping("C71.1")])
        .tree_nodes([TermCodeNode::new(
            context_code("Diagnose"),
            TermCode::new(ICD10, "C71", ""),
            vec![
                TermCodeNode::leaf(context_code("Diagnose"), TermCode::new(ICD10, "C71.0", "")),
                TermCodeNode::leaf(context_code("Diagnose"), TermCode::new(ICD10, "C71.1", "")),
            ],
        )])
        .code_system_alias(ICD10, "icd10")
        .build();
    let criterion = Criterion::concept(concept("Diagnose", ICD10, &["C71"]));

    assert_eq!(
        first_body(&translate(context, vec![vec![criterion]])),
        "exists([Condition: Code 'C71.0' from icd10]) or\nexists([Condition: Code 'C71.1' from icd10])"
    );
}

#[test]
fn criteria_in_one_clause_get_distinct_names() {
    let context = mapping_context(vec![diagnosis_mapping("C71"), diagnosis_mapping("C72")]);
    let library = translate(
        context,
        vec![vec![
            Criterion::concept(concept("Diagnose", ICD10, &["C71"])),
            Criterion::concept(concept("Diagnose", ICD10, &["C72"])),
        ]],
    );

    assert_eq!(
        library.print_patient_context(),
        "context Patient

define \"Criterion 1\":
  exists([Condition: Code 'C71' from icd10])

define \"Criterion 2\":
  exists([Condition: Code 'C72' from icd10])

define InInitialPopulation:
  \"Criterion 1\" or
  \"Criterion 2\"
"
    );
}

#[test]
fn exclusion_criteria_are_renamed_after_inclusion() {
    let context = mapping_context(vec![
        diagnosis_mapping("C71"),
        diagnosis_mapping("C72"),
        diagnosis_mapping("C73"),
    ]);
    let criterion = |code: &str| Criterion::concept(concept("Diagnose", ICD10, &[code]));
    let query = StructuredQuery::new(
        vec![vec![criterion("C71")], vec![criterion("C72")]],
        vec![vec![criterion("C73")]],
    )
    .unwrap();
    let library = Translator::new(context).to_cql(&query).unwrap();

    assert_eq!(
        library.print_patient_context(),
        "context Patient

define \"Criterion 1\":
  exists([Condition: Code 'C71' from icd10])

define \"Criterion 2\":
  exists([Condition: Code 'C72' from icd10])

define Inclusion:
  \"Criterion 1\" and
  \"Criterion 2\"

define \"Criterion 3\":
  exists([Condition: Code 'C73' from icd10])

define InInitialPopulation:
  Inclusion and
  not \"Criterion 3\"
"
    );
}

#[test]
fn custom_header_is_printed() {
    let header = LibraryHeader {
        name: "Cohort".into(),
        version: "2.0.0".into(),
        fhir_version: "4.0.1".into(),
        fhir_helpers_version: "4.0.1".into(),
    };
    let context = mapping_context(vec![diagnosis_mapping("C71")]);
    let query = StructuredQuery::new(
        vec![vec![Criterion::concept(concept("Diagnose", ICD10, &["C71"]))]],
        vec![],
    )
    .unwrap();
    let library = Translator::new(context).with_header(header).to_cql(&query).unwrap();
    assert!(library.print().starts_with("library Cohort version '2.0.0'\n"));
}
