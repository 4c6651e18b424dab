//! Dependency checks over the model arena.
//!
//! `graph[node]` lists the nodes that `node` reads. Leaves (parameters,
//! variables, placeholders) have no edges.

/// Detect cyclic dependencies
///
/// Uses depth-first search with a recursion stack. Returns the index of a
/// node on the first cycle found.
pub fn detect_cycles(graph: &[Vec<usize>]) -> Result<(), usize> {
    topological_order(graph).map(|_| ())
}

/// Order nodes so every node comes after everything it reads.
///
/// Fails with the index of a node on a cycle.
pub fn topological_order(graph: &[Vec<usize>]) -> Result<Vec<usize>, usize> {
    let node_count = graph.len();
    let mut visited = vec![false; node_count];
    let mut rec_stack = vec![false; node_count];
    let mut order = Vec::with_capacity(node_count);

    fn dfs(
        node: usize,
        graph: &[Vec<usize>],
        visited: &mut [bool],
        rec_stack: &mut [bool],
        order: &mut Vec<usize>,
    ) -> Result<(), usize> {
        visited[node] = true;
        rec_stack[node] = true;

        for &dependency in &graph[node] {
            if !visited[dependency] {
                dfs(dependency, graph, visited, rec_stack, order)?;
            } else if rec_stack[dependency] {
                return Err(dependency);
            }
        }

        rec_stack[node] = false;
        order.push(node);
        Ok(())
    }

    for i in 0..node_count {
        if !visited[i] {
            dfs(i, graph, &mut visited, &mut rec_stack, &mut order)?;
        }
    }

    Ok(order)
}
