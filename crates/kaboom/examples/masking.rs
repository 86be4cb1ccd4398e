//! Masking — children clipped to their parent's shape.
//!
//! The left window shows stripes only inside a circle; the right one cuts
//! the circle out. Click a window to swap its mask mode.

use kaboom::prelude::*;

fn main() -> kaboom::Result<()> {
    Game::new(KaboomConfig::default().title("kaboom — masking").size(480.0, 240.0))
        .setup(setup)
        .run()
}

fn stripes(ctx: &mut Context, parent: ObjId) -> kaboom::Result<()> {
    for i in 0..8 {
        let hue = i as f32 / 8.0;
        ctx.add_child(
            parent,
            comps![
                rect(200.0, 14.0),
                pos(-100.0, -100.0 + i as f32 * 26.0),
                color(hue, 0.4, 1.0 - hue),
                rotate(15.0),
            ],
        )?;
    }
    Ok(())
}

fn setup(ctx: &mut Context) -> kaboom::Result<()> {
    let left = ctx.add(comps![circle(80.0), pos(120.0, 120.0), rotate(0.0), area(), Mask::intersect(), "window"])?;
    stripes(ctx, left)?;

    let right = ctx.add(comps![circle(80.0), pos(360.0, 120.0), rotate(0.0), area(), Mask::subtract(), "window"])?;
    stripes(ctx, right)?;

    // the mask itself spins, so the clip shape moves with it
    ctx.on_update("window", |ctx, obj| {
        let a = ctx.angle(obj) + 30.0 * ctx.dt();
        ctx.set_angle(obj, a);
        Ok(())
    });

    ctx.on_click("window", |ctx, obj| {
        let subtract = ctx.is(obj, "subtracting");
        if subtract {
            ctx.use_comp(obj, Mask::intersect())?;
            ctx.unuse(obj, "subtracting")?;
        } else {
            ctx.use_comp(obj, Mask::subtract())?;
            ctx.use_comp(obj, "subtracting")?;
        }
        ctx.debug_log(format!("mask mode: {}", if subtract { "intersect" } else { "subtract" }));
        Ok(())
    });

    // "subtracting" tracks the right window's starting mode
    ctx.use_comp(right, "subtracting")?;
    Ok(())
}
