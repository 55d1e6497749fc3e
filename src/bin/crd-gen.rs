use halla::crd::freezer::DeploymentFreezer;
use kube::CustomResourceExt;

fn main() {
    // Generate CRD and print as JSON (kubectl accepts JSON)
    match serde_json::to_string_pretty(&DeploymentFreezer::crd()) {
        Ok(crd) => println!("{}", crd),
        Err(e) => {
            eprintln!("Error serializing CRD: {}", e);
            std::process::exit(1);
        }
    }
}
