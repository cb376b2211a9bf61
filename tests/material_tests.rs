//! Material Tests
//!
//! Tests for:
//! - Scalar setters and the key bits they maintain
//! - Texture channel updates (UV transform slots, lightmap and material params)
//! - Opacity map classification from the albedo texture
//! - Samplers, UV sets and bulk texture transforms
//! - Clone / assign semantics and fallthrough flags
//! - Concurrent readers while a writer re-points channels

use std::sync::Arc;
use std::thread;

use glam::{Mat4, Vec2, Vec3};

use myth_materials::resources::material::{
    ExtraFallthrough, NUM_TOTAL_FLAGS, OutlineWidthMode, ToonParams, key_flag_fallthrough_index,
};
use myth_materials::resources::texture::{
    MaterialMappingMode, Texture, TextureMap, TextureSampler, TextureSource, TextureTransform,
    TextureUsage,
};
use myth_materials::{CullFaceMode, MapChannel, Material, MaterialKey, OpacityMapMode};

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn alpha_albedo_map(usage: TextureUsage, defined: bool) -> (Arc<TextureMap>, Arc<Texture>) {
    let texture = if defined {
        Texture::new("albedo", 256, usage)
    } else {
        Texture::pending("albedo", 256, usage)
    };
    let map = TextureMap::from_texture(texture.clone())
        .with_use_alpha_channel(true)
        .into_ref();
    (map, texture)
}

// ============================================================================
// Defaults
// ============================================================================

#[test]
fn new_material_has_documented_defaults() {
    let material = Material::new("default");

    assert_eq!(material.name(), "default");
    assert_eq!(material.model(), Material::STANDARD_PBR);
    assert_eq!(material.layers(), 1);
    assert_eq!(material.albedo(), Vec3::splat(0.5));
    assert!(approx(material.opacity(), 1.0));
    assert!(approx(material.roughness(), 1.0));
    assert!(approx(material.metallic(), 0.0));
    assert!(approx(material.opacity_cutoff(), 0.5));
    assert_eq!(material.opacity_map_mode(), OpacityMapMode::Opaque);
    assert_eq!(material.lightmap_params(), Vec2::new(0.0, 1.0));
    assert_eq!(material.texcoord_transforms(), [Mat4::IDENTITY; 4]);

    let key = material.key();
    assert!(!key.is_albedo());
    assert!(key.is_opaque());
    assert_eq!(key.cull_face_mode(), CullFaceMode::Back);
}

// ============================================================================
// Scalar Setters
// ============================================================================

#[test]
fn srgb_albedo_then_opacity_sets_albedo_and_translucency() {
    let material = Material::default();
    material.set_albedo(Vec3::new(1.0, 0.0, 0.0), true);
    material.set_opacity(0.5);

    let key = material.key();
    assert!(key.contains(MaterialKey::ALBEDO_VAL));
    assert!(key.contains(MaterialKey::OPACITY_VAL));
    assert!(approx(material.opacity(), 0.5));
    assert!(material.albedo().abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), EPSILON));
}

#[test]
fn albedo_bit_is_always_set() {
    for color in [Vec3::ZERO, Vec3::ONE, Vec3::new(-1.0, 2.0, 0.5)] {
        let material = Material::default();
        material.set_albedo(color, false);
        assert!(material.key().is_albedo());
        assert_eq!(material.albedo(), color);
    }
}

#[test]
fn emissive_bit_tracks_any_positive_channel() {
    let material = Material::default();
    for (color, expected) in [
        (Vec3::ZERO, false),
        (Vec3::new(0.0, 0.0, 0.1), true),
        (Vec3::new(-1.0, -1.0, -1.0), false),
        (Vec3::new(-1.0, 0.5, 0.0), true),
    ] {
        material.set_emissive(color, false);
        assert_eq!(material.key().is_emissive(), expected, "{color:?}");
    }
}

#[test]
fn srgb_emissive_is_stored_linear() {
    let material = Material::default();
    material.set_emissive(Vec3::splat(0.5), true);
    assert!(approx(material.emissive().x, 0.214_041_14));
}

#[test]
fn roughness_is_clamped_and_drives_glossy() {
    let material = Material::default();
    for input in [-2.0, 0.0, 0.3, 0.999, 1.0, 7.5, f32::NAN] {
        material.set_roughness(input);
        let stored = material.roughness();
        assert!((0.0..=1.0).contains(&stored), "{input} -> {stored}");
        assert_eq!(material.key().is_glossy(), stored < 1.0);
    }
}

#[test]
fn metallic_and_scattering_are_clamped() {
    let material = Material::default();
    material.set_metallic(3.0);
    material.set_scattering(-1.0);
    assert!(approx(material.metallic(), 1.0));
    assert!(approx(material.scattering(), 0.0));
    assert!(material.key().is_metallic());
    assert!(!material.key().is_scattering());
}

#[test]
fn opacity_cutoff_bit_marks_non_default_value() {
    let material = Material::default();
    material.set_opacity_cutoff(0.25);
    assert!(material.key().is_opacity_cutoff());

    material.set_opacity_cutoff(0.5);
    assert!(!material.key().is_opacity_cutoff());

    material.set_opacity_cutoff(4.0);
    assert!(approx(material.opacity_cutoff(), 1.0));
}

#[test]
fn opacity_is_stored_unclamped() {
    let material = Material::default();
    material.set_opacity(1.5);
    assert!(approx(material.opacity(), 1.5));
    assert!(!material.key().is_translucent_factor());
}

#[test]
fn unlit_and_cull_face_mode() {
    let material = Material::default();
    material.set_unlit(true);
    material.set_cull_face_mode(CullFaceMode::None);

    assert!(material.is_unlit());
    assert_eq!(material.cull_face_mode(), CullFaceMode::None);
    assert_eq!(material.key().cull_face_mode(), CullFaceMode::None);
}

// ============================================================================
// Texture Channels
// ============================================================================

#[test]
fn lightmap_sets_params_and_shared_transform_slot() {
    let material = Material::default();
    let transform = TextureTransform {
        offset: Vec2::new(0.25, 0.5),
        scale: Vec2::splat(2.0),
        ..Default::default()
    };
    let map = TextureMap::from_texture(Texture::new("lightmap", 64, TextureUsage::COLOR))
        .with_transform(transform)
        .with_lightmap_offset_scale(0.2, 0.8)
        .into_ref();

    material.set_texture_map(MapChannel::Light, Some(map.clone()));

    assert_eq!(material.lightmap_params(), Vec2::new(0.2, 0.8));
    assert_eq!(material.texcoord_transforms()[1], map.texture_transform().matrix());
    assert_eq!(material.texcoord_transforms()[0], Mat4::IDENTITY);
    assert!(material.key().is_map_channel(MapChannel::Light));
}

#[test]
fn occlusion_and_light_share_slot_one() {
    let material = Material::default();
    let occlusion = TextureMap::default()
        .with_transform(TextureTransform {
            rotation: 1.0,
            ..Default::default()
        })
        .into_ref();
    let light = TextureMap::default()
        .with_transform(TextureTransform {
            scale: Vec2::splat(3.0),
            ..Default::default()
        })
        .into_ref();

    material.set_texture_map(MapChannel::Occlusion, Some(occlusion));
    material.set_texture_map(MapChannel::Light, Some(light.clone()));
    assert_eq!(material.texcoord_transforms()[1], light.texture_transform().matrix());
}

#[test]
fn clearing_a_channel_restores_defaults() {
    let material = Material::default();
    let map = TextureMap::default()
        .with_lightmap_offset_scale(0.1, 0.5)
        .with_mapping_mode(MaterialMappingMode::Projected)
        .with_repeat(false)
        .into_ref();

    material.set_texture_map(MapChannel::Light, Some(map));
    assert_eq!(material.material_params(), Vec2::new(1.0, 0.0));

    material.set_texture_map(MapChannel::Light, None);
    assert!(material.texture_map(MapChannel::Light).is_none());
    assert!(!material.key().is_map_channel(MapChannel::Light));
    assert_eq!(material.lightmap_params(), Vec2::new(0.0, 1.0));
    assert_eq!(material.material_params(), Vec2::new(0.0, 1.0));
    assert_eq!(material.texcoord_transforms()[1], Mat4::IDENTITY);
}

#[test]
fn clearing_albedo_twice_is_idempotent() {
    let material = Material::default();
    let (map, _) = alpha_albedo_map(TextureUsage::COLOR | TextureUsage::ALPHA, true);
    material.set_texture_map(MapChannel::Albedo, Some(map));

    material.set_texture_map(MapChannel::Albedo, None);
    let key_once = material.key();
    let maps_once = material.texture_maps().len();

    material.set_texture_map(MapChannel::Albedo, None);
    assert_eq!(material.key(), key_once);
    assert_eq!(material.texture_maps().len(), maps_once);
    assert_eq!(maps_once, 0);
}

#[test]
fn texture_maps_are_listed_in_channel_order() {
    let material = Material::default();
    for channel in [MapChannel::Normal, MapChannel::Emissive, MapChannel::Matcap] {
        material.set_texture_map(channel, Some(TextureMap::default().into_ref()));
    }

    let channels: Vec<MapChannel> = material.texture_maps().into_iter().map(|(c, _)| c).collect();
    assert_eq!(channels, [MapChannel::Emissive, MapChannel::Normal, MapChannel::Matcap]);
}

#[test]
fn listed_maps_are_detached_from_the_material() {
    let material = Material::default();
    let (map, _) = alpha_albedo_map(TextureUsage::COLOR | TextureUsage::ALPHA, true);

    let mut listed = material.texture_maps();
    listed.push((MapChannel::Albedo, map.clone()));
    assert!(material.texture_map(MapChannel::Albedo).is_none());
    assert!(!material.key().is_map_channel(MapChannel::Albedo));
    assert_eq!(material.opacity_map_mode(), OpacityMapMode::Opaque);

    material.set_texture_map(MapChannel::Albedo, Some(map));
    assert!(material.texture_map(MapChannel::Albedo).is_some());
    assert!(material.key().is_map_channel(MapChannel::Albedo));
    assert_eq!(material.opacity_map_mode(), OpacityMapMode::Blend);
}

// ============================================================================
// Opacity Map Classification
// ============================================================================

#[test]
fn alpha_mask_albedo_classifies_as_mask() {
    let material = Material::default();
    let (map, texture) = alpha_albedo_map(TextureUsage::COLOR | TextureUsage::ALPHA | TextureUsage::ALPHA_MASK, false);

    assert!(!material.set_texture_map(MapChannel::Albedo, Some(map)));
    assert_eq!(material.opacity_map_mode(), OpacityMapMode::Opaque);

    texture.mark_defined();
    assert!(material.reset_opacity_map());

    let key = material.key();
    assert!(key.is_opacity_mask_map());
    assert!(!key.is_translucent_map());
    assert_eq!(material.opacity_map_mode(), OpacityMapMode::Mask);

    assert!(!material.reset_opacity_map());
}

#[test]
fn blended_alpha_classifies_as_blend_on_assignment() {
    let material = Material::default();
    let (map, _) = alpha_albedo_map(TextureUsage::COLOR | TextureUsage::ALPHA, true);

    assert!(material.set_texture_map(MapChannel::Albedo, Some(map)));
    assert_eq!(material.opacity_map_mode(), OpacityMapMode::Blend);
    assert!(material.key().is_translucent());

    assert!(material.set_texture_map(MapChannel::Albedo, None));
    assert_eq!(material.opacity_map_mode(), OpacityMapMode::Opaque);
}

#[test]
fn texture_without_alpha_stays_opaque() {
    let material = Material::default();
    let (map, _) = alpha_albedo_map(TextureUsage::COLOR, true);
    assert!(!material.set_texture_map(MapChannel::Albedo, Some(map)));
    assert_eq!(material.opacity_map_mode(), OpacityMapMode::Opaque);
}

#[test]
fn alpha_is_ignored_unless_the_map_uses_it() {
    let material = Material::default();
    let map = TextureMap::from_texture(Texture::new("albedo", 16, TextureUsage::ALPHA))
        .with_use_alpha_channel(false)
        .into_ref();
    assert!(!material.set_texture_map(MapChannel::Albedo, Some(map)));
    assert_eq!(material.opacity_map_mode(), OpacityMapMode::Opaque);
}

#[test]
fn unresolved_source_is_not_classified() {
    let material = Material::default();
    let source = TextureSource::new();
    let map = TextureMap::new(Some(source.clone()))
        .with_use_alpha_channel(true)
        .into_ref();

    assert!(!material.set_texture_map(MapChannel::Albedo, Some(map)));

    source.set_gpu_texture(Some(Texture::new("late", 16, TextureUsage::ALPHA)));
    assert!(material.reset_opacity_map());
    assert_eq!(material.opacity_map_mode(), OpacityMapMode::Blend);
}

#[test]
fn explicit_mode_disables_classification() {
    for mode in OpacityMapMode::ALL {
        let material = Material::default();
        material.set_opacity_map_mode(mode);
        let key_before = material.key();

        let (map, _) = alpha_albedo_map(TextureUsage::ALPHA | TextureUsage::ALPHA_MASK, true);
        assert!(!material.set_texture_map(MapChannel::Albedo, Some(map)));
        assert!(!material.reset_opacity_map());

        let key_after = material.key();
        assert_eq!(material.opacity_map_mode(), mode);
        assert_eq!(
            key_after & !MaterialKey::ALBEDO_MAP,
            key_before,
            "only the albedo map bit may change"
        );
    }
}

// ============================================================================
// Samplers, UV Sets & Bulk Transforms
// ============================================================================

#[test]
fn apply_sampler_pushes_onto_source() {
    let material = Material::default();
    let source = TextureSource::with_texture(Texture::new("n", 32, TextureUsage::NORMAL));
    material.set_texture_map(MapChannel::Normal, Some(TextureMap::new(Some(source.clone())).into_ref()));

    material.apply_sampler(MapChannel::Normal);
    assert!(source.sampler().is_none());

    material.set_sampler(MapChannel::Normal, TextureSampler::clamped());
    material.apply_sampler(MapChannel::Normal);
    assert_eq!(source.sampler(), Some(TextureSampler::clamped()));
}

#[test]
fn apply_sampler_without_map_is_noop() {
    let material = Material::default();
    material.set_sampler(MapChannel::Emissive, TextureSampler::default());
    material.apply_sampler(MapChannel::Emissive);
    assert_eq!(material.sampler(MapChannel::Emissive), Some(TextureSampler::default()));
}

#[test]
fn sampler_channels_are_sorted() {
    let material = Material::default();
    material.set_sampler(MapChannel::Matcap, TextureSampler::default());
    material.set_sampler(MapChannel::Albedo, TextureSampler::clamped());

    assert_eq!(material.sampler_channels(), [MapChannel::Albedo, MapChannel::Matcap]);
}

#[test]
fn texcoord_set_defaults_to_zero() {
    let material = Material::default();
    assert_eq!(material.texcoord_set(MapChannel::Occlusion), 0);
    material.set_texcoord_set(MapChannel::Occlusion, 1);
    assert_eq!(material.texcoord_set(MapChannel::Occlusion), 1);
}

#[test]
fn bulk_transform_overrides_every_map_and_slot() {
    let material = Material::default();
    let albedo = TextureMap::default().into_ref();
    let normal = TextureMap::default().into_ref();
    material.set_texture_map(MapChannel::Albedo, Some(albedo.clone()));
    material.set_texture_map(MapChannel::Normal, Some(normal.clone()));

    let transform = TextureTransform {
        offset: Vec2::new(0.5, 0.0),
        ..Default::default()
    };
    material.set_texture_transforms(transform, MaterialMappingMode::Projected, false);

    for map in [&albedo, &normal] {
        assert_eq!(map.texture_transform(), transform);
        assert_eq!(map.mapping_mode(), MaterialMappingMode::Projected);
        assert!(!map.repeat());
    }
    assert_eq!(material.texcoord_transforms(), [transform.matrix(); 4]);
    assert_eq!(material.material_params(), Vec2::new(1.0, 0.0));
}

// ============================================================================
// Clone & Assign
// ============================================================================

#[test]
fn clone_copies_values_and_shares_maps() {
    let material = Material::new("source");
    material.set_roughness(0.25);
    let map = TextureMap::default().into_ref();
    material.set_texture_map(MapChannel::Normal, Some(map.clone()));

    let copy = material.clone();
    assert_ne!(copy.uuid(), material.uuid());
    assert_eq!(copy.properties(), material.properties());
    assert!(copy
        .texture_map(MapChannel::Normal)
        .is_some_and(|m| Arc::ptr_eq(&m, &map)));

    copy.set_roughness(0.75);
    copy.set_texture_map(MapChannel::Normal, None);
    assert!(approx(material.roughness(), 0.25));
    assert!(material.texture_map(MapChannel::Normal).is_some());
}

#[test]
fn assign_keeps_destination_identity() {
    let source = Material::new("source");
    source.set_metallic(1.0);
    source.set_sampler(MapChannel::Albedo, TextureSampler::clamped());
    source.set_texcoord_set(MapChannel::Albedo, 1);

    let destination = Material::new("destination");
    destination.set_texture_map(MapChannel::Emissive, Some(TextureMap::default().into_ref()));
    let uuid = destination.uuid();

    destination.assign_from(&source);
    assert_eq!(destination.uuid(), uuid);
    assert_eq!(destination.name(), "source");
    assert!(destination.key().is_metallic());
    assert!(destination.texture_map(MapChannel::Emissive).is_none());
    assert_eq!(destination.sampler(MapChannel::Albedo), Some(TextureSampler::clamped()));
    assert_eq!(destination.texcoord_set(MapChannel::Albedo), 1);

    destination.assign_from(&destination);
    assert_eq!(destination.name(), "source");
}

// ============================================================================
// Fallthrough & Toon
// ============================================================================

#[test]
fn fallthrough_flags_cover_key_bits_and_extras() {
    let material = Material::default();
    let glossy = key_flag_fallthrough_index(MaterialKey::GLOSSY_VAL).expect("single bit");
    let outline = ExtraFallthrough::Outline.index();

    material.set_property_does_fallthrough(glossy, true);
    material.set_property_does_fallthrough(outline, true);
    material.set_property_does_fallthrough(NUM_TOTAL_FLAGS + 10, true);

    assert!(material.property_does_fallthrough(glossy));
    assert!(material.property_does_fallthrough(outline));
    assert!(!material.property_does_fallthrough(NUM_TOTAL_FLAGS + 10));
    assert_eq!(
        (0..NUM_TOTAL_FLAGS).filter(|&i| material.property_does_fallthrough(i)).count(),
        2
    );

    material.set_default_fallthrough(true);
    assert!(material.default_fallthrough());
}

#[test]
fn toon_model_and_params() {
    let material = Material::default();
    assert!(!material.is_toon());
    material.set_model(Material::TOON);
    material.set_layers(2);
    assert!(material.is_toon());
    assert_eq!(material.layers(), 2);

    let params = ToonParams {
        shading_toony: 0.5,
        outline_width_mode: OutlineWidthMode::ScreenCoordinates,
        outline_width: 0.02,
        ..Default::default()
    };
    material.set_toon_params(params);
    assert_eq!(material.toon_params(), params);
    assert!(approx(ToonParams::default().parametric_rim_fresnel_power, 5.0));
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn readers_keep_snapshots_while_writer_repoints() {
    let material = Arc::new(Material::default());
    let first = TextureMap::from_texture(Texture::new("first", 8, TextureUsage::COLOR)).into_ref();
    material.set_texture_map(MapChannel::Albedo, Some(first));

    let writer = {
        let material = material.clone();
        thread::spawn(move || {
            for i in 0..200 {
                let map = TextureMap::from_texture(Texture::new("w", i, TextureUsage::ALPHA))
                    .with_use_alpha_channel(true)
                    .into_ref();
                material.set_texture_map(MapChannel::Albedo, Some(map));
                material.set_roughness(i as f32 / 200.0);
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let material = material.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    if let Some(map) = material.texture_map(MapChannel::Albedo) {
                        let _ = map.size();
                        let _ = map.texture_transform().matrix();
                    }
                    let _ = material.key().opacity_map_mode();
                }
            })
        })
        .collect();

    writer.join().expect("writer");
    for reader in readers {
        reader.join().expect("reader");
    }
    assert_eq!(material.opacity_map_mode(), OpacityMapMode::Blend);
}
