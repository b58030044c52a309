fn main() {
    env_logger::init();

    // Prefer a real adapter; fall back to the CPU reference backend so the
    // example runs anywhere.
    let ctx = match texblas::Context::new() {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("no GPU adapter ({e}), using CPU reference backend");
            texblas::Context::cpu()
        }
    };
    println!("backend: {}", ctx.name());

    let a = texblas::Tensor::new(&ctx, (2, 3), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    println!("a = {:?}, pad = {}", a, a.pad());

    // Keep a copy of `a` across the consuming transpose.
    let b = a.duplicate().unwrap();
    let at = a.transpose().unwrap();

    // at (3x2) * b... b is 2x3, so at * b is 3x3.
    let mut product = at.matmul(b).unwrap();
    let result = product.transfer(true).unwrap();

    println!("a^T * a = {:?}", result);
    println!("live textures after transfer: {}", ctx.live_textures());
}
