use managed_certs_controller::crd::managed_certificate_crd;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let crd = managed_certificate_crd()?;
    print!("{}", serde_yaml::to_string(&crd)?);
    Ok(())
}
