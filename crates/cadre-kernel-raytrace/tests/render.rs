//! End-to-end rendering properties.

use std::sync::Arc;

use approx::assert_relative_eq;
use cadre_kernel_math::{Point3, Transform, Vec3};
use cadre_kernel_raytrace::{
    pack_rgba, trace_ray, Camera, RenderSettings, Renderer, SceneAccel, SceneTracer, Tracer,
};
use cadre_mesh::primitives;
use cadre_scene::{EntityId, Scene};

fn front_camera(aspect: f64) -> Camera {
    Camera::look_at(
        Point3::new(0.0, 0.0, 5.0),
        Point3::origin(),
        Vec3::y(),
        std::f64::consts::FRAC_PI_4,
        aspect,
        0.1,
        100.0,
    )
    .unwrap()
}

fn unit_cube_scene() -> (Scene, EntityId) {
    let mut scene = Scene::new();
    let id = scene.add_entity(
        "cube",
        Transform::identity(),
        Arc::new(primitives::cube(1.0, 1.0, 1.0)),
    );
    (scene, id)
}

fn busy_scene() -> Scene {
    let mut scene = Scene::new();
    let cube = Arc::new(primitives::cube(1.0, 1.0, 1.0));
    let sphere = Arc::new(primitives::uv_sphere(0.6, 24, 12));
    let tilt = Transform::rotation_y(0.4).then(&Transform::rotation_x(0.3));
    scene.add_entity("cube", tilt, cube.clone());
    scene.add_entity("ball", Transform::translation(1.2, 0.5, -0.5), sphere.clone());
    scene.add_entity(
        "slab",
        Transform::translation(-1.0, -0.8, 0.0).then(&Transform::scale(1.5, 0.2, 1.5)),
        cube,
    );
    scene.add_entity("far", Transform::translation(0.0, 0.0, -6.0), sphere);
    scene
}

#[test]
fn center_ray_hits_unit_cube_front_face() {
    let (scene, id) = unit_cube_scene();
    let camera = front_camera(1.0);
    let ray = camera.ray_through_ndc(0.0, 0.0);

    let accel = SceneAccel::build(&scene, &RenderSettings::default().bvh);
    for hit in [trace_ray(&ray, &scene), accel.trace(&ray)] {
        assert!(hit.is_hit());
        assert_relative_eq!(hit.distance, 4.5, epsilon = 1e-9);
        assert_relative_eq!(hit.normal, Vec3::z(), epsilon = 1e-9);
        assert_relative_eq!(hit.position.z, 0.5, epsilon = 1e-9);
        assert_eq!(hit.entity, id);
    }
}

#[test]
fn center_pixel_of_odd_image_picks_cube() {
    let (scene, id) = unit_cube_scene();
    let camera = front_camera(1.0);
    let mut renderer = Renderer::new(9, 9, RenderSettings::default()).unwrap();

    let hit = renderer.pick_scene(&scene, &camera, 4, 4).unwrap();
    assert_eq!(hit.entity, id);
    assert_relative_eq!(hit.distance, 4.5, epsilon = 1e-9);

    let corner = renderer.pick_scene(&scene, &camera, 0, 0).unwrap();
    assert!(!corner.is_hit());
    assert!(renderer.pick_scene(&scene, &camera, 9, 0).is_none());
}

#[test]
fn empty_scene_renders_background() {
    let scene = Scene::new();
    let settings = RenderSettings::default();
    let expected = {
        let [r, g, b] = settings.background.map(|c| (c * 255.0 + 0.5) as u8);
        pack_rgba(r, g, b, 255)
    };

    for use_bvh in [true, false] {
        let settings = RenderSettings {
            use_bvh,
            ..settings.clone()
        };
        let mut renderer = Renderer::new(16, 10, settings).unwrap();
        renderer.render_scene(&scene, &front_camera(1.6));
        assert!(renderer.image().pixels().iter().all(|&p| p == expected));
    }
}

#[test]
fn output_is_rgba8_row_major() {
    let (scene, _) = unit_cube_scene();
    let mut renderer = Renderer::new(20, 12, RenderSettings::default()).unwrap();
    renderer.render_scene(&scene, &front_camera(20.0 / 12.0));

    let bytes = renderer.image().as_bytes();
    assert_eq!(bytes.len(), 20 * 12 * 4);
    assert!(bytes.chunks_exact(4).all(|px| px[3] == 255));
    let px = renderer.image().pixel(3, 2).unwrap().to_ne_bytes();
    let offset = (2 * 20 + 3) * 4;
    assert_eq!(&bytes[offset..offset + 4], &px);
}

#[test]
fn serial_and_parallel_renders_are_identical() {
    let scene = busy_scene();
    let camera = front_camera(4.0 / 3.0);

    let mut images = Vec::new();
    for parallel in [false, true] {
        for use_bvh in [false, true] {
            let settings = RenderSettings {
                parallel,
                use_bvh,
                ..Default::default()
            };
            let mut renderer = Renderer::new(64, 48, settings).unwrap();
            renderer.render_scene(&scene, &camera);
            images.push(renderer.image().clone());
        }
    }

    // Same traversal, different scheduling.
    assert_eq!(images[0].as_bytes(), images[2].as_bytes());
    assert_eq!(images[1].as_bytes(), images[3].as_bytes());
}

#[test]
fn bvh_and_brute_force_agree_per_pixel() {
    let scene = busy_scene();
    let camera = front_camera(1.0);
    let accel = SceneAccel::build(&scene, &RenderSettings::default().bvh);
    let brute = SceneTracer::new(&scene);

    let (w, h) = (48, 48);
    let mut mismatches = 0;
    for y in 0..h {
        for x in 0..w {
            let ray = camera.ray_for_pixel(x, y, w, h);
            let a = brute.trace(&ray);
            let b = accel.trace(&ray);
            let same = a.is_hit() == b.is_hit()
                && a.entity == b.entity
                && (!a.is_hit()
                    || ((a.distance - b.distance).abs() <= 1e-9
                        && (a.normal - b.normal).norm() <= 1e-9));
            if !same {
                mismatches += 1;
            }
        }
    }
    assert_eq!(mismatches, 0);
}

#[test]
fn closest_hit_independent_of_entity_order() {
    let cube = Arc::new(primitives::cube(1.0, 1.0, 1.0));
    let placements = [
        Transform::translation(0.0, 0.0, 1.0),
        Transform::translation(0.1, 0.0, -1.0),
        Transform::translation(-0.1, 0.1, 2.5),
    ];

    let mut forward = Scene::new();
    for (i, t) in placements.iter().enumerate() {
        forward.add_entity(format!("e{i}"), t.clone(), cube.clone());
    }
    let mut reversed = Scene::new();
    for (i, t) in placements.iter().enumerate().rev() {
        reversed.add_entity(format!("e{i}"), t.clone(), cube.clone());
    }

    let camera = front_camera(1.0);
    for (x, y) in [(8, 8), (5, 9), (11, 6), (0, 0)] {
        let ray = camera.ray_for_pixel(x, y, 17, 17);
        let a = trace_ray(&ray, &forward);
        let b = trace_ray(&ray, &reversed);
        assert_eq!(a.is_hit(), b.is_hit());
        if a.is_hit() {
            assert_eq!(a.distance, b.distance);
            let name_a = &forward.entity(a.entity).unwrap().name;
            let name_b = &reversed.entity(b.entity).unwrap().name;
            assert_eq!(name_a, name_b);
        }
    }
}

#[test]
fn render_scene_rebuilds_stale_bvh() {
    let (mut scene, id) = unit_cube_scene();
    let camera = front_camera(1.0);
    let mut renderer = Renderer::new(9, 9, RenderSettings::default()).unwrap();

    renderer.render_scene(&scene, &camera);
    let before = renderer.image().pixel(4, 4);
    let rev = renderer.accel().map(|a| a.revision());
    assert_eq!(rev, Some(scene.revision()));

    scene
        .set_transform(id, Transform::translation(0.0, 10.0, 0.0))
        .unwrap();
    renderer.render_scene(&scene, &camera);
    assert_eq!(renderer.accel().map(|a| a.revision()), Some(scene.revision()));
    assert_ne!(renderer.image().pixel(4, 4), before);
}

#[test]
fn cached_bvh_not_reused_for_another_scene() {
    let (a, _) = unit_cube_scene();
    let mut b = Scene::new();
    b.add_entity(
        "cube",
        Transform::translation(0.0, 50.0, 0.0),
        Arc::new(primitives::cube(1.0, 1.0, 1.0)),
    );
    let camera = front_camera(1.0);

    let mut renderer = Renderer::new(9, 9, RenderSettings::default()).unwrap();
    renderer.render_scene(&a, &camera);
    renderer.render_scene(&b, &camera);

    let brute_settings = RenderSettings {
        use_bvh: false,
        ..Default::default()
    };
    let mut reference = Renderer::new(9, 9, brute_settings).unwrap();
    reference.render_scene(&b, &camera);

    assert_eq!(renderer.image().as_bytes(), reference.image().as_bytes());
    assert_eq!(renderer.accel().map(|acc| acc.revision()), Some(b.revision()));
    assert!(!renderer.pick_scene(&b, &camera, 4, 4).unwrap().is_hit());
}
