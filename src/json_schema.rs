//! Published JSON Schemas (Draft 2020-12) for every supported resource type
//! and format version, and the structural validation pass that runs them.
//!
//! The schemas carry every single-field rule: required keys, literal
//! enumerations, identifier patterns and numeric bounds. Rules that relate
//! several fields live in [`crate::validator`] and [`crate::resolver`].

use serde_json::{json, Map, Value};

use crate::error::{field_path_from_pointer, FieldError};
use crate::fields::{
    AXIS_ID_MAX_LEN, DOI_PATTERN, HTTP_URL_PATTERN, IDENTIFIER_PATTERN, ORCID_PATTERN,
    SHA256_PATTERN, SPACE_UNITS, TENSOR_ID_MAX_LEN, TIME_UNITS, VERSION_PATTERN,
};
use crate::processing::{
    LEGACY_POSTPROCESSING_STEP_NAMES, LEGACY_PREPROCESSING_STEP_NAMES, POSTPROCESSING_STEP_IDS,
    PREPROCESSING_STEP_IDS,
};
use crate::tensor::DataType;
use crate::types::{ResourceType, SchemaVersion};
use crate::weights::WeightsFormat;

pub const JSON_SCHEMA_DIALECT: &str = "https://json-schema.org/draft/2020-12/schema";

/// Characters and length of a v0.5 model name.
pub const MODEL_NAME_PATTERN: &str = r"^[A-Za-z0-9_+\- ()]{5,128}$";

const FORMAT_VERSION_PATTERN: &str = r"^[0-9]+\.[0-9]+\.[0-9]+$";
const LEGACY_AXES_PATTERN: &str = "^[bitczyx]+$";
const LEGACY_DEPENDENCIES_PATTERN: &str = "^(conda|maven|pip):.+$";

/// The JSON Schema for `resource_type` at `version`, or `None` if the
/// combination does not exist.
pub fn json_schema(resource_type: ResourceType, version: SchemaVersion) -> Option<Value> {
    let body = match (resource_type, version) {
        (ResourceType::Generic, SchemaVersion::V0_2) => generic(base_v0_2("generic")),
        (ResourceType::Generic, SchemaVersion::V0_3) => generic(base_v0_3("generic")),
        (ResourceType::Dataset, SchemaVersion::V0_2) => dataset(base_v0_2("dataset")),
        (ResourceType::Dataset, SchemaVersion::V0_3) => dataset(base_v0_3("dataset")),
        (ResourceType::Notebook, SchemaVersion::V0_2) => notebook(base_v0_2("notebook")),
        (ResourceType::Notebook, SchemaVersion::V0_3) => notebook(base_v0_3("notebook")),
        (ResourceType::Application, SchemaVersion::V0_2) => application(base_v0_2("application")),
        (ResourceType::Application, SchemaVersion::V0_3) => application(base_v0_3("application")),
        (ResourceType::Collection, SchemaVersion::V0_2) => {
            collection(base_v0_2("collection"), "rdf_source")
        }
        (ResourceType::Collection, SchemaVersion::V0_3) => {
            collection(base_v0_3("collection"), "entry_source")
        }
        (ResourceType::Model, SchemaVersion::V0_4) => model_v0_4(),
        (ResourceType::Model, SchemaVersion::V0_5) => model_v0_5(),
        _ => return None,
    };

    let Value::Object(body) = body else {
        return None;
    };
    let mut schema = Map::new();
    schema.insert("$schema".into(), json!(JSON_SCHEMA_DIALECT));
    schema.insert(
        "title".into(),
        json!(format!("bioimage.io {resource_type} description {version}")),
    );
    schema.extend(body);
    schema.insert("$defs".into(), Value::Object(defs()));
    Some(Value::Object(schema))
}

/// Validate `document` against `schema`, collecting every violation with a
/// dotted field path.
pub fn structural_errors(schema: &Value, document: &Value) -> Vec<FieldError> {
    let validator = match jsonschema::validator_for(schema) {
        Ok(validator) => validator,
        Err(e) => {
            tracing::error!(error = %e, "published schema failed to compile");
            return vec![FieldError::structural("", format!("invalid schema: {e}"))];
        }
    };

    validator
        .iter_errors(document)
        .map(|e| {
            FieldError::structural(
                field_path_from_pointer(&e.instance_path.to_string()),
                e.to_string(),
            )
        })
        .collect()
}

fn def(name: &str) -> Value {
    json!({ "$ref": format!("#/$defs/{name}") })
}

fn array_of(items: Value) -> Value {
    json!({ "type": "array", "items": items })
}

fn non_empty_array_of(items: Value) -> Value {
    json!({ "type": "array", "items": items, "minItems": 1 })
}

fn string() -> Value {
    json!({ "type": "string" })
}

fn non_empty_string() -> Value {
    json!({ "type": "string", "minLength": 1 })
}

fn number() -> Value {
    json!({ "type": "number" })
}

fn string_enum(values: &[&str]) -> Value {
    json!({ "enum": values })
}

fn identifier(max_len: usize) -> Value {
    json!({
        "type": "string",
        "minLength": 1,
        "maxLength": max_len,
        "pattern": IDENTIFIER_PATTERN,
    })
}

/// An object schema from `(key, schema)` pairs.
fn object(properties: Vec<(&str, Value)>, required: &[&str]) -> Value {
    let properties: Map<String, Value> = properties
        .into_iter()
        .map(|(key, schema)| (key.to_string(), schema))
        .collect();
    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), json!(required));
    }
    Value::Object(schema)
}

/// Same as [`object`] but rejecting unknown keys.
fn closed_object(properties: Vec<(&str, Value)>, required: &[&str]) -> Value {
    let mut schema = object(properties, required);
    if let Value::Object(map) = &mut schema {
        map.insert("additionalProperties".into(), json!(false));
    }
    schema
}

/// An object discriminated by the string field `tag`. Each variant schema
/// applies only when `tag` equals the variant name.
fn tagged_union(tag: &str, variants: Vec<(&str, Value)>) -> Value {
    let names: Vec<&str> = variants.iter().map(|(name, _)| *name).collect();
    let branches: Vec<Value> = variants
        .into_iter()
        .map(|(name, then)| {
            let mut condition = Map::new();
            condition.insert(tag.to_string(), json!({ "const": name }));
            json!({
                "if": { "properties": condition, "required": [tag] },
                "then": then,
            })
        })
        .collect();
    let mut tag_property = Map::new();
    tag_property.insert(tag.to_string(), string_enum(&names));
    json!({
        "type": "object",
        "required": [tag],
        "properties": tag_property,
        "allOf": branches,
    })
}

/// A step variant whose `kwargs` must match `kwargs`.
fn step_with_kwargs(kwargs: Value, kwargs_required: bool) -> Value {
    let required: &[&str] = if kwargs_required { &["kwargs"] } else { &[] };
    object(vec![("kwargs", kwargs)], required)
}

fn step_without_kwargs() -> Value {
    object(vec![("kwargs", json!({ "type": "object" }))], &[])
}

fn eps() -> Value {
    json!({ "type": "number", "exclusiveMinimum": 0, "maximum": 0.1 })
}

fn min_percentile() -> Value {
    json!({ "type": "number", "minimum": 0, "exclusiveMaximum": 100 })
}

fn max_percentile() -> Value {
    json!({ "type": "number", "exclusiveMinimum": 1, "maximum": 100 })
}

fn dataset_modes() -> Value {
    string_enum(&["per_dataset", "per_sample"])
}

fn defs() -> Map<String, Value> {
    let mut defs = Map::new();
    let mut add = |name: &str, schema: Value| {
        defs.insert(name.to_string(), schema);
    };

    add("tensor_id", identifier(TENSOR_ID_MAX_LEN));
    add("axis_id", identifier(AXIS_ID_MAX_LEN));
    add(
        "sha256",
        json!({ "type": "string", "pattern": SHA256_PATTERN }),
    );
    add("file_source", non_empty_string());
    add(
        "http_url",
        json!({ "type": "string", "pattern": HTTP_URL_PATTERN }),
    );
    add(
        "version",
        json!({ "type": ["string", "number"], "pattern": VERSION_PATTERN }),
    );
    add(
        "author",
        object(
            vec![
                ("name", non_empty_string()),
                ("affiliation", string()),
                ("email", string()),
                ("github_user", string()),
                ("orcid", json!({ "type": "string", "pattern": ORCID_PATTERN })),
            ],
            &["name"],
        ),
    );
    add(
        "maintainer",
        object(
            vec![
                ("github_user", non_empty_string()),
                ("name", string()),
                ("affiliation", string()),
                ("email", string()),
                ("orcid", json!({ "type": "string", "pattern": ORCID_PATTERN })),
            ],
            &["github_user"],
        ),
    );
    add(
        "uploader",
        object(vec![("email", string()), ("name", string())], &["email"]),
    );
    add("cite_entry", {
        let mut cite = object(
            vec![
                ("text", string()),
                ("doi", json!({ "type": "string", "pattern": DOI_PATTERN })),
                ("url", def("http_url")),
            ],
            &["text"],
        );
        if let Value::Object(map) = &mut cite {
            map.insert(
                "anyOf".into(),
                json!([{ "required": ["doi"] }, { "required": ["url"] }]),
            );
        }
        cite
    });
    add(
        "badge",
        object(
            vec![
                ("label", string()),
                ("icon", string()),
                ("url", def("http_url")),
            ],
            &["label", "url"],
        ),
    );
    add(
        "file_descr",
        object(
            vec![("source", def("file_source")), ("sha256", def("sha256"))],
            &["source"],
        ),
    );
    add(
        "linked_resource",
        object(
            vec![
                ("id", non_empty_string()),
                ("version_number", json!({ "type": "integer", "minimum": 1 })),
            ],
            &["id"],
        ),
    );
    add(
        "run_mode",
        object(
            vec![("name", non_empty_string()), ("kwargs", json!({ "type": "object" }))],
            &["name"],
        ),
    );
    add(
        "data_type",
        json!({ "enum": DataType::ALL.iter().map(DataType::as_str).collect::<Vec<_>>() }),
    );
    add(
        "float_or_list",
        json!({ "anyOf": [number(), array_of(number())] }),
    );
    add(
        "value_range",
        json!({
            "type": "array",
            "minItems": 2,
            "maxItems": 2,
            "items": { "type": ["number", "null"] },
        }),
    );
    add(
        "legacy_axes",
        json!({ "type": "string", "pattern": LEGACY_AXES_PATTERN }),
    );

    add_axis_defs(&mut add);
    add_step_defs(&mut add);
    add_tensor_defs(&mut add);
    add_weights_defs(&mut add);

    add("dataset_v0_2", dataset(base_v0_2("dataset")));
    add("dataset_v0_3", dataset(base_v0_3("dataset")));

    defs
}

fn add_axis_defs(add: &mut impl FnMut(&str, Value)) {
    let fixed = json!({ "type": "integer", "minimum": 1 });
    let parameterized = closed_object(
        vec![
            ("min", json!({ "type": "integer", "minimum": 1 })),
            ("step", json!({ "type": "integer", "minimum": 1 })),
        ],
        &["min", "step"],
    );
    let reference = closed_object(
        vec![
            ("tensor_id", def("tensor_id")),
            ("axis_id", def("axis_id")),
            ("offset", json!({ "type": "integer" })),
        ],
        &["tensor_id", "axis_id"],
    );
    let data_dependent = closed_object(
        vec![
            ("min", json!({ "type": "integer", "minimum": 1 })),
            ("max", json!({ "type": "integer", "minimum": 1 })),
        ],
        &[],
    );
    add(
        "axis_size_input",
        json!({ "anyOf": [fixed.clone(), parameterized.clone(), reference.clone()] }),
    );
    add(
        "axis_size_output",
        json!({ "anyOf": [fixed, parameterized, reference, data_dependent] }),
    );

    for (name, size, with_halo) in [
        ("axis_input", "axis_size_input", false),
        ("axis_output", "axis_size_output", true),
    ] {
        let scale = json!({ "type": "number", "exclusiveMinimum": 0 });
        let halo = json!({ "type": "integer", "minimum": 0 });
        let mut time = vec![
            ("id", def("axis_id")),
            ("description", string()),
            ("size", def(size)),
            ("unit", string_enum(TIME_UNITS)),
            ("scale", scale.clone()),
        ];
        let mut space = vec![
            ("id", def("axis_id")),
            ("description", string()),
            ("size", def(size)),
            ("unit", string_enum(SPACE_UNITS)),
            ("scale", scale),
        ];
        if with_halo {
            time.push(("halo", halo.clone()));
            space.push(("halo", halo));
        }
        add(
            name,
            tagged_union(
                "type",
                vec![
                    (
                        "batch",
                        object(
                            vec![
                                ("id", def("axis_id")),
                                ("description", string()),
                                ("size", json!({ "const": 1 })),
                            ],
                            &[],
                        ),
                    ),
                    (
                        "channel",
                        object(
                            vec![
                                ("id", def("axis_id")),
                                ("description", string()),
                                ("channel_names", non_empty_array_of(string())),
                            ],
                            &["channel_names"],
                        ),
                    ),
                    (
                        "index",
                        object(
                            vec![
                                ("id", def("axis_id")),
                                ("description", string()),
                                ("size", def(size)),
                            ],
                            &["size"],
                        ),
                    ),
                    ("time", object(time, &["size"])),
                    ("space", object(space, &["size"])),
                ],
            ),
        );
    }
}

fn step_variants(ids: &[&str]) -> Vec<(&'static str, Value)> {
    let axes = || array_of(def("axis_id"));
    let all: Vec<(&'static str, Value)> = vec![
        (
            "binarize",
            step_with_kwargs(
                json!({
                    "type": "object",
                    "anyOf": [
                        object(vec![("threshold", number())], &["threshold"]),
                        object(
                            vec![
                                ("threshold", non_empty_array_of(number())),
                                ("axis", def("axis_id")),
                            ],
                            &["threshold", "axis"],
                        ),
                    ],
                }),
                true,
            ),
        ),
        (
            "clip",
            step_with_kwargs(
                object(vec![("min", number()), ("max", number())], &["min", "max"]),
                true,
            ),
        ),
        (
            "ensure_dtype",
            step_with_kwargs(object(vec![("dtype", def("data_type"))], &["dtype"]), true),
        ),
        (
            "scale_linear",
            step_with_kwargs(
                json!({
                    "type": "object",
                    "anyOf": [
                        object(vec![("gain", number()), ("offset", number())], &[]),
                        object(
                            vec![
                                ("axis", def("axis_id")),
                                ("gain", array_of(number())),
                                ("offset", array_of(number())),
                            ],
                            &["axis"],
                        ),
                    ],
                }),
                false,
            ),
        ),
        ("sigmoid", step_without_kwargs()),
        (
            "softmax",
            step_with_kwargs(object(vec![("axis", def("axis_id"))], &[]), false),
        ),
        (
            "fixed_zero_mean_unit_variance",
            step_with_kwargs(
                json!({
                    "type": "object",
                    "anyOf": [
                        object(
                            vec![
                                ("mean", number()),
                                ("std", json!({ "type": "number", "exclusiveMinimum": 0 })),
                            ],
                            &["mean", "std"],
                        ),
                        object(
                            vec![
                                ("mean", non_empty_array_of(number())),
                                (
                                    "std",
                                    non_empty_array_of(
                                        json!({ "type": "number", "exclusiveMinimum": 0 }),
                                    ),
                                ),
                                ("axis", def("axis_id")),
                            ],
                            &["mean", "std", "axis"],
                        ),
                    ],
                }),
                true,
            ),
        ),
        (
            "zero_mean_unit_variance",
            step_with_kwargs(object(vec![("axes", axes()), ("eps", eps())], &[]), false),
        ),
        (
            "scale_range",
            step_with_kwargs(
                object(
                    vec![
                        ("axes", axes()),
                        ("min_percentile", min_percentile()),
                        ("max_percentile", max_percentile()),
                        ("eps", eps()),
                        ("reference_tensor", def("tensor_id")),
                        ("mode", dataset_modes()),
                    ],
                    &[],
                ),
                false,
            ),
        ),
        (
            "scale_mean_variance",
            step_with_kwargs(
                object(
                    vec![
                        ("reference_tensor", def("tensor_id")),
                        ("axes", axes()),
                        ("eps", eps()),
                        ("mode", dataset_modes()),
                    ],
                    &["reference_tensor"],
                ),
                true,
            ),
        ),
    ];
    all.into_iter()
        .filter(|(id, _)| ids.contains(id))
        .collect()
}

fn legacy_step_variants(names: &[&str]) -> Vec<(&'static str, Value)> {
    let axes = || def("legacy_axes");
    let all: Vec<(&'static str, Value)> = vec![
        (
            "binarize",
            step_with_kwargs(object(vec![("threshold", number())], &["threshold"]), true),
        ),
        (
            "clip",
            step_with_kwargs(
                object(vec![("min", number()), ("max", number())], &["min", "max"]),
                true,
            ),
        ),
        (
            "scale_linear",
            step_with_kwargs(
                object(
                    vec![
                        ("axes", axes()),
                        ("gain", def("float_or_list")),
                        ("offset", def("float_or_list")),
                    ],
                    &[],
                ),
                false,
            ),
        ),
        ("sigmoid", step_without_kwargs()),
        (
            "zero_mean_unit_variance",
            step_with_kwargs(
                object(
                    vec![
                        ("mode", string_enum(&["fixed", "per_dataset", "per_sample"])),
                        ("axes", axes()),
                        ("mean", def("float_or_list")),
                        ("std", def("float_or_list")),
                        ("eps", eps()),
                    ],
                    &[],
                ),
                false,
            ),
        ),
        (
            "scale_range",
            step_with_kwargs(
                object(
                    vec![
                        ("mode", dataset_modes()),
                        ("axes", axes()),
                        ("min_percentile", min_percentile()),
                        ("max_percentile", max_percentile()),
                        ("eps", eps()),
                        ("reference_tensor", def("tensor_id")),
                    ],
                    &["mode"],
                ),
                true,
            ),
        ),
        (
            "scale_mean_variance",
            step_with_kwargs(
                object(
                    vec![
                        ("mode", dataset_modes()),
                        ("reference_tensor", def("tensor_id")),
                        ("axes", axes()),
                        ("eps", eps()),
                    ],
                    &["mode", "reference_tensor"],
                ),
                true,
            ),
        ),
    ];
    all.into_iter()
        .filter(|(name, _)| names.contains(name))
        .collect()
}

fn add_step_defs(add: &mut impl FnMut(&str, Value)) {
    add(
        "step_pre",
        tagged_union("id", step_variants(PREPROCESSING_STEP_IDS)),
    );
    add(
        "step_post",
        tagged_union("id", step_variants(POSTPROCESSING_STEP_IDS)),
    );
    add(
        "legacy_step_pre",
        tagged_union("name", legacy_step_variants(LEGACY_PREPROCESSING_STEP_NAMES)),
    );
    add(
        "legacy_step_post",
        tagged_union("name", legacy_step_variants(LEGACY_POSTPROCESSING_STEP_NAMES)),
    );
}

fn add_tensor_defs(add: &mut impl FnMut(&str, Value)) {
    let nominal = object(
        vec![
            (
                "values",
                non_empty_array_of(json!({ "type": ["number", "string", "boolean"] })),
            ),
            ("type", def("data_type")),
            ("unit", string()),
        ],
        &["values"],
    );
    let interval = object(
        vec![
            ("type", def("data_type")),
            ("range", def("value_range")),
            ("unit", string()),
            ("scale", number()),
            ("offset", json!({ "type": ["number", "null"] })),
        ],
        &[],
    );
    add("tensor_data", json!({ "anyOf": [nominal, interval] }));

    add(
        "input_tensor_v0_5",
        object(
            vec![
                ("id", def("tensor_id")),
                ("description", string()),
                ("axes", non_empty_array_of(def("axis_input"))),
                ("test_tensor", def("file_descr")),
                ("sample_tensor", def("file_descr")),
                ("data", def("tensor_data")),
                ("preprocessing", array_of(def("step_pre"))),
                ("optional", json!({ "type": "boolean" })),
            ],
            &["axes", "test_tensor"],
        ),
    );
    add(
        "output_tensor_v0_5",
        object(
            vec![
                ("id", def("tensor_id")),
                ("description", string()),
                ("axes", non_empty_array_of(def("axis_output"))),
                ("test_tensor", def("file_descr")),
                ("sample_tensor", def("file_descr")),
                ("data", def("tensor_data")),
                ("postprocessing", array_of(def("step_post"))),
            ],
            &["axes", "test_tensor"],
        ),
    );

    let sizes = || array_of(json!({ "type": "integer", "minimum": 1 }));
    add(
        "input_tensor_v0_4",
        object(
            vec![
                ("name", def("tensor_id")),
                ("description", string()),
                ("axes", def("legacy_axes")),
                ("data_type", def("data_type")),
                ("data_range", def("value_range")),
                (
                    "shape",
                    json!({
                        "anyOf": [
                            sizes(),
                            closed_object(
                                vec![
                                    ("min", sizes()),
                                    ("step", array_of(json!({ "type": "integer", "minimum": 0 }))),
                                ],
                                &["min", "step"],
                            ),
                        ]
                    }),
                ),
                ("preprocessing", array_of(def("legacy_step_pre"))),
            ],
            &["name", "axes", "data_type", "shape"],
        ),
    );
    add(
        "output_tensor_v0_4",
        object(
            vec![
                ("name", def("tensor_id")),
                ("description", string()),
                ("axes", def("legacy_axes")),
                ("data_type", def("data_type")),
                ("data_range", def("value_range")),
                (
                    "shape",
                    json!({
                        "anyOf": [
                            sizes(),
                            closed_object(
                                vec![
                                    ("reference_tensor", def("tensor_id")),
                                    ("scale", array_of(json!({ "type": ["number", "null"] }))),
                                    ("offset", array_of(number())),
                                ],
                                &["reference_tensor", "scale", "offset"],
                            ),
                        ]
                    }),
                ),
                ("halo", array_of(json!({ "type": "integer", "minimum": 0 }))),
                ("postprocessing", array_of(def("legacy_step_post"))),
            ],
            &["name", "axes", "data_type", "shape"],
        ),
    );
}

fn weights_entry(mut extra: Vec<(&'static str, Value)>, required: &[&str]) -> Value {
    let mut properties = vec![
        ("source", def("file_source")),
        ("sha256", def("sha256")),
        ("authors", array_of(def("author"))),
        (
            "parent",
            json!({ "enum": WeightsFormat::ALL.iter().map(WeightsFormat::as_str).collect::<Vec<_>>() }),
        ),
        ("comment", string()),
    ];
    properties.append(&mut extra);
    let mut all_required = vec!["source"];
    all_required.extend_from_slice(required);
    object(properties, &all_required)
}

fn weights(entries: Vec<(WeightsFormat, Value)>) -> Value {
    let properties = entries
        .into_iter()
        .map(|(format, schema)| (format.as_str(), schema))
        .collect();
    let mut schema = object(properties, &[]);
    if let Value::Object(map) = &mut schema {
        map.insert("minProperties".into(), json!(1));
    }
    schema
}

fn add_weights_defs(add: &mut impl FnMut(&str, Value)) {
    let opset = || json!({ "type": "integer", "minimum": 7 });
    let deps = || json!({ "type": "string", "pattern": LEGACY_DEPENDENCIES_PATTERN });

    add(
        "weights_v0_4",
        weights(vec![
            (
                WeightsFormat::KerasHdf5,
                weights_entry(
                    vec![("tensorflow_version", def("version")), ("dependencies", deps())],
                    &[],
                ),
            ),
            (
                WeightsFormat::Onnx,
                weights_entry(vec![("opset_version", opset()), ("dependencies", deps())], &[]),
            ),
            (
                WeightsFormat::PytorchStateDict,
                weights_entry(
                    vec![
                        ("architecture", non_empty_string()),
                        ("architecture_sha256", def("sha256")),
                        ("kwargs", json!({ "type": "object" })),
                        ("pytorch_version", def("version")),
                        ("dependencies", deps()),
                    ],
                    &["architecture"],
                ),
            ),
            (
                WeightsFormat::TensorflowJs,
                weights_entry(
                    vec![("tensorflow_version", def("version")), ("dependencies", deps())],
                    &[],
                ),
            ),
            (
                WeightsFormat::TensorflowSavedModelBundle,
                weights_entry(
                    vec![("tensorflow_version", def("version")), ("dependencies", deps())],
                    &[],
                ),
            ),
            (
                WeightsFormat::Torchscript,
                weights_entry(
                    vec![("pytorch_version", def("version")), ("dependencies", deps())],
                    &[],
                ),
            ),
        ]),
    );

    add(
        "architecture_v0_5",
        json!({
            "anyOf": [
                object(
                    vec![
                        ("source", def("file_source")),
                        ("sha256", def("sha256")),
                        ("callable", non_empty_string()),
                        ("kwargs", json!({ "type": "object" })),
                    ],
                    &["source", "callable"],
                ),
                object(
                    vec![
                        ("callable", non_empty_string()),
                        ("import_from", non_empty_string()),
                        ("kwargs", json!({ "type": "object" })),
                    ],
                    &["callable", "import_from"],
                ),
            ]
        }),
    );
    add(
        "weights_v0_5",
        weights(vec![
            (
                WeightsFormat::KerasHdf5,
                weights_entry(
                    vec![("tensorflow_version", def("version"))],
                    &["tensorflow_version"],
                ),
            ),
            (
                WeightsFormat::Onnx,
                weights_entry(vec![("opset_version", opset())], &["opset_version"]),
            ),
            (
                WeightsFormat::PytorchStateDict,
                weights_entry(
                    vec![
                        ("architecture", def("architecture_v0_5")),
                        ("pytorch_version", def("version")),
                        ("dependencies", def("file_descr")),
                    ],
                    &["architecture", "pytorch_version"],
                ),
            ),
            (
                WeightsFormat::TensorflowJs,
                weights_entry(
                    vec![("tensorflow_version", def("version"))],
                    &["tensorflow_version"],
                ),
            ),
            (
                WeightsFormat::TensorflowSavedModelBundle,
                weights_entry(
                    vec![
                        ("tensorflow_version", def("version")),
                        ("dependencies", def("file_descr")),
                    ],
                    &["tensorflow_version"],
                ),
            ),
            (
                WeightsFormat::Torchscript,
                weights_entry(
                    vec![("pytorch_version", def("version"))],
                    &["pytorch_version"],
                ),
            ),
        ]),
    );
}

/// Properties and required keys of a resource body under construction.
struct Body {
    properties: Vec<(&'static str, Value)>,
    required: Vec<&'static str>,
}

impl Body {
    fn with(mut self, key: &'static str, schema: Value, required: bool) -> Self {
        match self.properties.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = schema,
            None => self.properties.push((key, schema)),
        }
        if required && !self.required.contains(&key) {
            self.required.push(key);
        }
        self
    }

    fn require(mut self, key: &'static str) -> Self {
        if !self.required.contains(&key) {
            self.required.push(key);
        }
        self
    }

    fn build(self) -> Value {
        object(self.properties, &self.required)
    }
}

fn common_base(resource_type: &str) -> Vec<(&'static str, Value)> {
    vec![
        ("type", json!({ "const": resource_type })),
        (
            "format_version",
            json!({ "type": "string", "pattern": FORMAT_VERSION_PATTERN }),
        ),
        ("name", non_empty_string()),
        ("description", string()),
        ("authors", array_of(def("author"))),
        ("maintainers", array_of(def("maintainer"))),
    ]
}

fn shared_tail() -> Vec<(&'static str, Value)> {
    vec![
        ("badges", array_of(def("badge"))),
        ("cite", array_of(def("cite_entry"))),
        ("config", json!({ "type": "object" })),
        ("covers", array_of(def("file_source"))),
        ("documentation", def("file_source")),
        ("git_repo", def("http_url")),
        ("icon", non_empty_string()),
        ("id", string()),
        ("license", string()),
        ("links", array_of(string())),
        ("tags", array_of(string())),
        ("uploader", def("uploader")),
        ("version", def("version")),
    ]
}

fn base_v0_2(resource_type: &str) -> Body {
    let mut properties = common_base(resource_type);
    properties.push((
        "attachments",
        object(vec![("files", array_of(def("file_source")))], &[]),
    ));
    properties.extend(shared_tail());
    properties.push(("download_url", def("http_url")));
    properties.push(("rdf_source", def("file_source")));
    Body {
        properties,
        required: vec!["type", "format_version", "name", "description"],
    }
}

fn base_v0_3(resource_type: &str) -> Body {
    let mut properties = common_base(resource_type);
    properties.push(("attachments", array_of(def("file_descr"))));
    properties.extend(shared_tail());
    properties.push(("id_emoji", string()));
    Body {
        properties,
        required: vec!["type", "format_version", "name", "description"],
    }
}

fn generic(base: Body) -> Value {
    base.build()
}

fn dataset(base: Body) -> Value {
    base.with("source", def("http_url"), false).build()
}

fn notebook(base: Body) -> Value {
    base.with("source", def("file_source"), true).build()
}

fn application(base: Body) -> Value {
    base.with("source", def("file_source"), false).build()
}

fn collection(base: Body, source_key: &'static str) -> Value {
    let entry = object(vec![(source_key, def("file_source")), ("id", string())], &[]);
    base.with("collection", array_of(entry), true).build()
}

/// Fields every model version requires beyond the generic base.
fn model_common(base: Body) -> Body {
    base.with("authors", non_empty_array_of(def("author")), true)
        .with("cite", non_empty_array_of(def("cite_entry")), true)
        .require("documentation")
        .require("license")
        .with("timestamp", non_empty_string(), true)
        .with("packaged_by", array_of(def("author")), false)
        .with("parent", def("linked_resource"), false)
        .with("run_mode", def("run_mode"), false)
}

fn model_v0_4() -> Value {
    model_common(base_v0_2("model"))
        .with("inputs", non_empty_array_of(def("input_tensor_v0_4")), true)
        .with("outputs", non_empty_array_of(def("output_tensor_v0_4")), true)
        .with("test_inputs", non_empty_array_of(def("file_source")), true)
        .with("test_outputs", non_empty_array_of(def("file_source")), true)
        .with("sample_inputs", array_of(def("file_source")), false)
        .with("sample_outputs", array_of(def("file_source")), false)
        .with("weights", def("weights_v0_4"), true)
        .with(
            "training_data",
            json!({ "anyOf": [def("dataset_v0_2"), def("linked_resource")] }),
            false,
        )
        .build()
}

fn model_v0_5() -> Value {
    model_common(base_v0_3("model"))
        .with(
            "name",
            json!({ "type": "string", "pattern": MODEL_NAME_PATTERN }),
            true,
        )
        .with("inputs", non_empty_array_of(def("input_tensor_v0_5")), true)
        .with("outputs", non_empty_array_of(def("output_tensor_v0_5")), true)
        .with("weights", def("weights_v0_5"), true)
        .with(
            "training_data",
            json!({ "anyOf": [def("dataset_v0_3"), def("linked_resource")] }),
            false,
        )
        .build()
}
