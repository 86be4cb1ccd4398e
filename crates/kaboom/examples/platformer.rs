//! Platformer — a box that runs, jumps and collects coins.
//!
//! Arrows move, Space jumps. F1 toggles inspect mode.

use kaboom::prelude::*;

const SPEED: f32 = 240.0;

fn main() -> kaboom::Result<()> {
    Game::new(
        KaboomConfig::default()
            .title("kaboom — platformer")
            .size(640.0, 360.0)
            .background(Color::rgb8(110, 170, 230))
            .gravity(1600.0),
    )
    .setup(setup)
    .run()
}

fn setup(ctx: &mut Context) -> kaboom::Result<()> {
    // Ground and a few ledges
    let platforms = [(0.0, 320.0, 1600.0), (200.0, 240.0, 120.0), (420.0, 170.0, 120.0), (700.0, 240.0, 160.0)];
    for (x, y, w) in platforms {
        ctx.add(comps![rect(w, 40.0), pos(x, y), color(0.3, 0.25, 0.2), area(), solid(), "platform"])?;
    }

    for (x, y) in [(250.0, 200.0), (470.0, 130.0), (760.0, 200.0), (1000.0, 280.0)] {
        ctx.add(comps![circle(8.0), pos(x, y), color(1.0, 0.85, 0.1), area(), "coin"])?;
    }

    let player = ctx.add(comps![rect(32.0, 32.0), pos(80.0, 40.0), color(1.0, 1.0, 1.0), area(), body(), "player"])?;
    let score = ctx.add(comps![text("coins: 0").size(16.0), pos(12.0, 12.0), fixed(), z(100.0)])?;

    let mut coins = 0;
    ctx.on_collide("player", "coin", move |ctx, _, col| {
        ctx.destroy(col.target)?;
        coins += 1;
        ctx.set_text(score, format!("coins: {coins}"));
        ctx.shake(4.0);
        ctx.debug_log(format!("picked up coin {coins}"));
        Ok(())
    });

    ctx.on_ground(player, |ctx, _| {
        ctx.debug_log("landed");
        Ok(())
    });

    ctx.on_key_down(Some(KeyCode::ArrowLeft), move |ctx, _| {
        ctx.move_at(player, Vec2::new(-SPEED, 0.0));
        Ok(())
    });
    ctx.on_key_down(Some(KeyCode::ArrowRight), move |ctx, _| {
        ctx.move_at(player, Vec2::new(SPEED, 0.0));
        Ok(())
    });
    ctx.on_key_press(Some(KeyCode::Space), move |ctx, _| {
        if ctx.is_grounded(player) {
            ctx.jump(player, None);
        }
        Ok(())
    });

    // Camera follows the player, and falling off the world restarts it
    ctx.on_frame_update(move |ctx| {
        let Some(p) = ctx.pos(player) else {
            return Ok(());
        };
        ctx.camera.pos = Some(Vec2::new(p.x.max(ctx.width() * 0.5), ctx.height() * 0.5));
        if p.y > 1000.0 {
            ctx.set_pos(player, Vec2::new(80.0, 40.0));
        }
        Ok(())
    });

    Ok(())
}
