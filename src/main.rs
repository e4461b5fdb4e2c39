use ds_arena::rocket_initialize;

#[rocket::launch]
fn rocket() -> _ {
    rocket_initialize()
}
