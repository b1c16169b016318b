use serde_json::json;

use fleet_dashboard::api::orchestrator_dto::manifest_dto::ManifestDto;
use fleet_dashboard::domain::manifest::manifest_view::{ManifestView, resolve_module_name, resolve_output_mounts, resolve_supervisor_url};
use fleet_dashboard::domain::utils::id::{DeviceId, ModuleId};

fn camera_pipeline() -> ManifestDto {
    serde_json::from_value(json!({
        "_id": "m1",
        "name": "camera-pipeline",
        "sequence": [
            { "device": "d1", "module": "mod1", "func": "take_image" },
            { "device": "d2", "module": "mod2", "func": "grayscale" }
        ],
        "fullManifest": {
            "d1": {
                "modules": [{ "id": "mod1", "name": "camera" }],
                "endpoints": {
                    "camera": {
                        "take_image": {
                            "url": "http://10.0.0.5:3000/camera/take_image",
                            "method": "get",
                            "request": { "parameters": [{ "name": "exposure", "required": true, "schema": { "type": "integer" } }] }
                        }
                    }
                }
            },
            "d2": {
                "modules": [{ "id": "mod2", "name": "imgfilter" }],
                "endpoints": {
                    "imgfilter": { "grayscale": { "url": "", "request": {} } }
                },
                "mounts": {
                    "imgfilter": {
                        "grayscale": { "output": [{ "path": "out.png", "media_type": "image/png", "stage": "output" }] }
                    }
                }
            }
        },
        "status": "deployed"
    }))
    .unwrap()
}

#[test]
fn test_module_name_resolves_across_devices() {
    let manifest = camera_pipeline();

    assert_eq!(resolve_module_name(&manifest, &ModuleId::new("mod1")), "camera");
    assert_eq!(resolve_module_name(&manifest, &ModuleId::new("mod2")), "imgfilter");
    assert_eq!(resolve_module_name(&manifest, &ModuleId::new("missing")), "module:missing");
}

#[test]
fn test_lookups_are_total_over_partial_data() {
    let manifest: ManifestDto = serde_json::from_value(json!({ "_id": "m2", "name": "bare" })).unwrap();
    let d1 = DeviceId::new("d1");

    assert!(manifest.sequence.is_empty());
    assert_eq!(resolve_module_name(&manifest, &ModuleId::new("mod1")), "module:mod1");
    assert_eq!(resolve_supervisor_url(&manifest, &d1, "camera", "take_image"), None);
    assert!(resolve_output_mounts(&manifest, &d1, "camera", "take_image").is_empty());
    assert!(ManifestView::new(&manifest).execution_parameters().is_empty());
    assert!(ManifestView::new(&manifest).resolved_steps().is_empty());
}

#[test]
fn test_supervisor_url_requires_every_path_segment() {
    let manifest = camera_pipeline();
    let d1 = DeviceId::new("d1");

    assert_eq!(resolve_supervisor_url(&manifest, &d1, "camera", "take_image").as_deref(), Some("http://10.0.0.5:3000/camera/take_image"));
    assert_eq!(resolve_supervisor_url(&manifest, &d1, "camera", "other"), None);
    assert_eq!(resolve_supervisor_url(&manifest, &d1, "imgfilter", "grayscale"), None);
    assert_eq!(resolve_supervisor_url(&manifest, &DeviceId::new("d9"), "camera", "take_image"), None);

    // Present but empty counts as missing.
    assert_eq!(resolve_supervisor_url(&manifest, &DeviceId::new("d2"), "imgfilter", "grayscale"), None);
}

#[test]
fn test_output_mounts_are_normalized() {
    let manifest = camera_pipeline();
    let mounts = resolve_output_mounts(&manifest, &DeviceId::new("d2"), "imgfilter", "grayscale");

    assert_eq!(mounts.len(), 1);
    assert_eq!(mounts[0].path, "out.png");
    assert_eq!(mounts[0].media_type, "image/png");
    assert_eq!(mounts[0].stage, "output");
}

#[test]
fn test_resolved_steps_follow_sequence_order() {
    let manifest = camera_pipeline();
    let steps = ManifestView::new(&manifest).resolved_steps();

    assert_eq!(steps.len(), 2);

    assert_eq!(steps[0].index, 0);
    assert_eq!(steps[0].device_id.as_str(), "d1");
    assert_eq!(steps[0].module_name, "camera");
    assert_eq!(steps[0].function_name, "take_image");
    assert_eq!(steps[0].supervisor_base.as_deref(), Some("http://10.0.0.5:3000"));

    assert_eq!(steps[1].index, 1);
    assert_eq!(steps[1].module_name, "imgfilter");
    assert_eq!(steps[1].supervisor_base, None);
    assert_eq!(steps[1].output_mounts.len(), 1);
}

#[test]
fn test_execution_parameters_come_from_first_step() {
    let manifest = camera_pipeline();
    let parameters = ManifestView::new(&manifest).execution_parameters();

    assert_eq!(parameters.len(), 1);
    assert_eq!(parameters[0].name, "exposure");
    assert!(parameters[0].required);
    assert!(parameters[0].is_integer());
}

#[test]
fn test_unknown_fields_are_kept() {
    let manifest = camera_pipeline();
    assert_eq!(manifest.extra_fields.get("status"), Some(&json!("deployed")));
}
